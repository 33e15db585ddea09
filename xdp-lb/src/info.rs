use crate::{
    addr::{inet_ntoa, mac_to_str},
    helpers::IfCache,
};
use xdp_lb_common::DestInfo;

/// Column aligned text table for the command line listings.
pub struct InfoTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl InfoTable {
    pub fn new(header: Vec<&str>) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: vec![],
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn sizes(&self) -> Vec<usize> {
        let mut sizes = self.header.iter().map(|s| s.len()).collect::<Vec<_>>();
        for row in &self.rows {
            for (i, s) in row.iter().enumerate().take(sizes.len()) {
                sizes[i] = sizes[i].max(s.len());
            }
        }
        sizes
    }

    fn line(sizes: &[usize], row: &[String]) -> String {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| format!("{0:<1$}", row.get(i).map_or("", |s| s.as_str()), size + 1))
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    pub fn render(&self, title: &str) -> String {
        let sizes = self.sizes();
        let header = Self::line(&sizes, &self.header);
        let width = header.len().max(title.len());
        let mut out = String::new();

        if !title.is_empty() {
            out.push_str(&format!("{title}\n"));
        }
        out.push_str(&format!("{header}\n{0:-<1$}\n", "-", width));
        for row in &self.rows {
            out.push_str(&Self::line(&sizes, row));
            out.push('\n');
        }
        out.push_str(&format!("{0:-<1$}\n", "-", width));
        out
    }

    pub fn print(&self, title: &str) {
        print!("{}", self.render(title));
    }
}

pub fn print_slots(slots: &[DestInfo]) {
    let mut ifc = IfCache::new("(na)");
    let mut tab = InfoTable::new(vec!["slot", "src", "dst", "mac", "if", "bytes", "packets"]);

    for (i, slot) in slots.iter().enumerate() {
        tab.push_row(vec![
            i.to_string(),
            inet_ntoa(slot.saddr),
            inet_ntoa(slot.daddr),
            mac_to_str(&slot.dmac),
            ifc.name(slot.ifindex as u32),
            slot.bytes.to_string(),
            slot.pkts.to_string(),
        ]);
    }

    tab.print(&format!("Redirect table ({} slots)", slots.len()));
}

use crate::backends::BackendServer;
use anyhow::{anyhow, Context};
use std::collections::HashMap;

pub(crate) fn if_index_to_name(index: u32) -> Option<String> {
    let mut name = [0 as libc::c_char; libc::IF_NAMESIZE];
    let iname = unsafe { libc::if_indextoname(index, name.as_mut_ptr()) };

    if iname.is_null() {
        None
    } else {
        let str = unsafe { std::ffi::CStr::from_ptr(iname) };
        let str = str.to_string_lossy();
        Some(str.to_string())
    }
}

/// Resolves an interface given as a number, `if#<n>` or a name.
pub fn ifindex(ifname: &str) -> Result<u32, anyhow::Error> {
    let number = ifname.strip_prefix("if#").unwrap_or(ifname);
    if let Ok(index) = number.parse::<u32>() {
        return Ok(index);
    }

    let c_interface = std::ffi::CString::new(ifname)?;
    let if_index = unsafe { libc::if_nametoindex(c_interface.as_ptr()) };
    if if_index == 0 {
        Err(anyhow!("No interface named {}", ifname))
    } else {
        Ok(if_index)
    }
}

pub struct IfCache {
    cache: HashMap<u32, String>,
    def_name: String,
}

impl IfCache {
    pub fn new<T: AsRef<str>>(def_name: T) -> Self {
        Self {
            cache: HashMap::new(),
            def_name: String::from(def_name.as_ref()),
        }
    }

    pub fn name(&mut self, ifindex: u32) -> String {
        if let Some(name) = self.cache.get(&ifindex) {
            return name.clone();
        }

        let name = match if_index_to_name(ifindex) {
            None => format!("{}:{}", &self.def_name, ifindex),
            Some(name) => format!("{}:{}", name, ifindex),
        };

        self.cache.insert(ifindex, name.clone());
        name
    }
}

/// `:9091` listens on every interface, anything else is left as is.
pub fn listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

/// Parses a `ip,mac,iface` backend argument.
pub fn parse_backend_arg(source_addr: &str, arg: &str) -> Result<BackendServer, anyhow::Error> {
    let parts: Vec<&str> = arg.split(',').map(str::trim).collect();
    let &[ip, mac, iface] = parts.as_slice() else {
        return Err(anyhow!("Expected backend as ip,mac,iface but got '{}'", arg));
    };
    let index = ifindex(iface).context(format!("Invalid interface in backend '{}'", arg))?;
    let index = u16::try_from(index)
        .map_err(|_| anyhow!("Interface index {} does not fit the table", index))?;
    Ok(BackendServer::new(source_addr, ip, mac, index))
}

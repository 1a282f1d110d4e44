use std::net::Ipv4Addr;

const DEFAULT_AGENT_PORT: i64 = 51243;

pub fn get_default_agent_port() -> i64 {
    DEFAULT_AGENT_PORT
}

const API_PORT: &str = "COLLECTOR_API_PORT";

const DEFAULT_API_PORT: u16 = 8266;

pub fn get_api_port() -> u16 {
    let port_from_env = std::env::var(API_PORT);
    port_from_env.map_or(DEFAULT_API_PORT, |res| res.parse().unwrap_or(DEFAULT_API_PORT))
}

const API_ADDR: &str = "COLLECTOR_API_ADDR";

const DEFAULT_API_ADDR: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 1);

pub fn get_api_addr() -> Ipv4Addr {
    let addr_from_env = std::env::var(API_ADDR);
    addr_from_env.map_or(DEFAULT_API_ADDR, |res| res.parse().unwrap_or(DEFAULT_API_ADDR))
}

const API_TOKEN: &str = "COLLECTOR_API_TOKEN";

pub fn get_api_token() -> Option<String> {
    let token_from_env = std::env::var(API_TOKEN);
    token_from_env.ok()
}

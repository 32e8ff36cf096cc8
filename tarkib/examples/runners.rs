//! Wires a few runners from configuration and runs them in name order.
//!
//! ```text
//! RUST_LOG=tarkib_container=debug cargo run -p tarkib --example runners
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use tarkib::prelude::*;
use tracing_subscriber::EnvFilter;

// === Capabilities ===

trait Runner: Send + Sync {
    fn run(&self) -> String;
}

// === Beans ===

#[derive(Default, Bean)]
#[bean(name = "endpoint", init = "check")]
pub struct Endpoint {
    #[wire("value:${server.host}")]
    pub host: String,
    #[wire("value:${server.port}")]
    pub port: u16,
}

impl Endpoint {
    fn check(&mut self) -> std::result::Result<(), String> {
        if self.host.is_empty() {
            return Err("server.host is empty".to_string());
        }
        Ok(())
    }
}

#[derive(Default, Bean)]
#[bean(name = "http", provides = "dyn Runner", destroy = "shutdown")]
pub struct HttpRunner {
    #[wire("autowire:endpoint")]
    pub endpoint: Option<Arc<Endpoint>>,
    #[wire("value:${server.workers}")]
    pub workers: u8,
}

impl HttpRunner {
    fn shutdown(&self) {
        println!("http: stopping {} workers", self.workers);
    }
}

impl Runner for HttpRunner {
    fn run(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("http: listening on {}:{}", endpoint.host, endpoint.port),
            None => "http: no endpoint".to_string(),
        }
    }
}

#[derive(Default, Bean)]
#[bean(name = "metrics", scope = "prototype", provides = "dyn Runner")]
pub struct MetricsRunner {
    #[wire("autowire:web")]
    pub endpoint: Option<Arc<Endpoint>>,
}

impl Runner for MetricsRunner {
    fn run(&self) -> String {
        let port = self.endpoint.as_ref().map_or(0, |e| e.port);
        format!("metrics: scraping port {port}")
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let server = BTreeMap::from([("host", "127.0.0.1"), ("port", "8080"), ("workers", "4")]);

    let factory = BeanFactory::builder()
        .property("server", &server)
        .bean::<Endpoint>()
        .bean::<HttpRunner>()
        .bean::<MetricsRunner>()
        .alias("endpoint", "web")
        .build()?;

    let mut runners: Vec<Arc<dyn Runner>> = Vec::new();
    factory.retrieve_beans(&mut runners)?;
    for runner in &runners {
        println!("{}", runner.run());
    }

    factory.destroy_singletons();
    Ok(())
}

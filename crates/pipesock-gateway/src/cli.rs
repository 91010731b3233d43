use clap::Parser;
use serde_json::{Map, Value};

/// Relay lines from stdin to WebSocket subscribers in periodic batches.
#[derive(Debug, Parser)]
#[command(name = "pipesock", version)]
pub struct Cli {
    /// Port for the pipesock to sit on.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind.
    #[arg(long)]
    pub bind: Option<String>,

    /// Pass input through to stdout.
    #[arg(short = 't', long = "through")]
    pub through: bool,

    /// Directory in ~/.pipesock to use as view.
    #[arg(short, long)]
    pub view: Option<String>,

    /// Number of previous broadcasts to keep in memory.
    #[arg(short, long)]
    pub num: Option<usize>,

    /// Delay between broadcasts of bundled events in ms.
    #[arg(short, long)]
    pub delay: Option<u64>,

    /// Config file (default: $PIPESOCK_CONFIG, then ~/.pipesock/pipesock.toml).
    #[arg(short, long)]
    pub config: Option<String>,
}

impl Cli {
    /// Flags given on the command line, shaped like the config file so they
    /// layer on top of it. Absent flags are left out.
    pub fn overrides(&self) -> Value {
        let mut server = Map::new();
        if let Some(port) = self.port {
            server.insert("port".into(), port.into());
        }
        if let Some(bind) = &self.bind {
            server.insert("bind".into(), bind.clone().into());
        }

        let mut hub = Map::new();
        if let Some(num) = self.num {
            hub.insert("buffer_size".into(), num.into());
        }
        if let Some(delay) = self.delay {
            hub.insert("delay_ms".into(), delay.into());
        }

        let mut source = Map::new();
        if self.through {
            source.insert("pass_through".into(), true.into());
        }

        let mut view = Map::new();
        if let Some(name) = &self.view {
            view.insert("name".into(), name.clone().into());
        }

        let mut root = Map::new();
        for (key, section) in [("server", server), ("hub", hub), ("source", source), ("view", view)] {
            if !section.is_empty() {
                root.insert(key.into(), Value::Object(section));
            }
        }
        Value::Object(root)
    }
}

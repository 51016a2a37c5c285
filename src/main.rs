use anyhow::{Context, Result};
use clap::Parser;
use echoping::ping::{
    report, RunConfig, StopReason, DEFAULT_HOST, DEFAULT_PACKET_SIZE, DEFAULT_TTL,
};
use echoping::socket::icmp::{IcmpConfig, IcmpSocket};
use echoping::Pinger;
use std::time::Duration;

/// Long flags the tool historically accepted with a single dash.
const SINGLE_DASH_FLAGS: [&str; 2] = ["ttl", "size"];

#[derive(Parser, Debug)]
#[command(
    name = "echoping",
    version,
    about = "Send ICMP echo requests to a host and report loss and round-trip times"
)]
struct Cli {
    /// Target host name or IP address
    host: Option<String>,

    /// Number of hops before a packet dies
    #[arg(long, default_value_t = DEFAULT_TTL, value_parser = clap::value_parser!(u8).range(1..))]
    ttl: u8,

    /// Size of the echo payload in bytes
    #[arg(short, long, default_value_t = DEFAULT_PACKET_SIZE)]
    size: usize,

    /// Only print the start line and the summary
    #[arg(short, long)]
    quiet: bool,

    /// Stop after this many probes
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    count: Option<u64>,

    /// Seconds between probes
    #[arg(short, long, default_value = "1", value_parser = parse_seconds)]
    interval: Duration,

    /// Seconds before the run is stopped regardless of count
    #[arg(short = 'w', long, value_parser = parse_seconds)]
    deadline: Option<Duration>,
}

impl Cli {
    fn into_config(self) -> RunConfig {
        let host = match self.host {
            Some(host) => host,
            None => {
                println!(
                    "No host given, using {} as the default host",
                    DEFAULT_HOST
                );
                DEFAULT_HOST.to_string()
            }
        };
        let mut config = RunConfig::new(host);
        config.set_ttl(self.ttl);
        config.set_size(self.size);
        config.set_quiet(self.quiet);
        config.set_count(self.count);
        config.set_interval(self.interval);
        config.set_deadline(self.deadline);
        config
    }
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .parse()
        .map_err(|_| format!("`{}` is not a number of seconds", s))?;
    if !(secs > 0.0) {
        return Err(format!("`{}` must be greater than zero", s));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}

/// Rewrites `-ttl 5` and `-size=16` to their double-dash forms.
fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .map(|arg| {
            let legacy = arg.strip_prefix('-').filter(|rest| !rest.starts_with('-'));
            match legacy {
                Some(rest) => {
                    let name = rest.split('=').next().unwrap_or(rest);
                    if SINGLE_DASH_FLAGS.contains(&name) {
                        format!("-{}", arg)
                    } else {
                        arg
                    }
                }
                None => arg,
            }
        })
        .collect()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse_from(normalize_args(std::env::args()));
    let config = cli.into_config();
    config.validate()?;

    let target = echoping::resolve(&config.host)
        .with_context(|| format!("cannot resolve {}", config.host))?;
    let socket = IcmpSocket::open(&IcmpConfig::new(target.family()))
        .context("failed to open ICMP socket (raw sockets need root or CAP_NET_RAW)")?;
    log::debug!("using {:?} ICMP socket", socket.sock_type());

    let name = if target.host == target.addr.to_string() {
        target.reverse_name()
    } else {
        target.host.clone()
    };
    println!("PING {} ({}): {} data bytes", name, target.addr, config.size);

    let quiet = config.quiet;
    let host = target.host.clone();
    let pinger = Pinger::new(config, target, socket);
    let stop = pinger.stop_handle();
    ctrlc::set_handler(move || stop.request(StopReason::Interrupted))
        .context("failed to install Ctrl-C handler")?;

    let result = pinger.run(|event| {
        if !quiet {
            println!("{}", event);
        }
    })?;
    log::info!("run stopped: {}", result.status);
    println!();
    println!("{}", report(&host, &result.stats));
    Ok(())
}

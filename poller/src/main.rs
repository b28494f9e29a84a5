/// Main module for the poller
///
/// Periodically fetches configured URLs and reports each response body, or
/// the reason the fetch failed, to the console.
mod config;
mod counter;
mod fetch;
mod job;
mod logger;
mod message;
mod periodic;
mod poller;
mod profiles;
mod reporters;
mod skip;

use clap::Parser;
use config::Config;
use poller::Poller;
use profiles::Profile;
use std::path::PathBuf;

/// Define command line arguments using clap
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file. Overrides --profile.
    #[arg(short, long, value_name = "FILE", env = "POLLER_CONFIG")]
    config: Option<PathBuf>,

    /// Built-in job set used when no configuration file is given
    #[arg(short, long, value_enum, default_value_t = Profile::RedeemEstimate)]
    profile: Profile,

    /// Print the jobs of every built-in profile and exit
    #[arg(long)]
    list_profiles: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<Config> {
        match &self.config {
            Some(path) => Config::new(path),
            None => {
                let config = self.profile.config();
                config.validate()?;
                Ok(config)
            }
        }
    }
}

fn print_profiles() {
    use clap::ValueEnum;

    for profile in Profile::value_variants() {
        let name = profile
            .to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_default();
        println!("{name}");
        for job in profile.jobs() {
            println!(
                "  {:<18} {:<20} every {}",
                job.label,
                job.path.as_deref().unwrap_or_default(),
                humantime::format_duration(job.interval)
            );
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if cli.list_profiles {
        print_profiles();
        return;
    }

    let logger_guard = logger::init();
    tracing::debug!("Config path: {:?}, profile: {:?}", cli.config, cli.profile);

    let conf = match cli.load_config() {
        Ok(conf) => conf,
        Err(e) => {
            eprintln!("Failed to initialize configuration: {:?}", e);
            drop(logger_guard);
            std::process::exit(1);
        }
    };

    if let Err(e) = Poller::new(conf).start().await {
        tracing::error!("poller stopped with error: {:?}", e);
        drop(logger_guard);
        std::process::exit(1);
    }
}

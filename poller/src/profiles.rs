use crate::config::{Config, JobConfig};
use clap::ValueEnum;
use std::time::Duration;

const FETCHABLE_PATH: &str = "/[fetchable] key";
const TIMELESS_PATH: &str = "/[timeless] key";
const REGULAR_PATH: &str = "/[regular] key";
const REDEEM_ESTIMATE_PATH: &str = "/REDEEM_ESTIMATE";

/// Built-in job sets, used when no config file is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Profile {
    /// REDEEM_ESTIMATE every second, counting up, with elapsed time
    RedeemEstimate,
    /// The fetchable key every second, ten ticks then stop
    Countdown,
    /// All cache keys on their own cadence, regular key on a coin flip
    CacheKeys,
}

impl Profile {
    pub fn jobs(self) -> Vec<JobConfig> {
        match self {
            Self::RedeemEstimate => vec![
                JobConfig::new(
                    "getRedeemEstimate",
                    REDEEM_ESTIMATE_PATH,
                    Duration::from_millis(1000),
                )
                .with_elapsed(),
            ],
            Self::Countdown => vec![
                JobConfig::new("getFetchable", FETCHABLE_PATH, Duration::from_millis(1000))
                    .with_max_ticks(10),
            ],
            Self::CacheKeys => vec![
                JobConfig::new("getFetchable", FETCHABLE_PATH, Duration::from_millis(20000)),
                JobConfig::new("getTimeless", TIMELESS_PATH, Duration::from_millis(5000)),
                JobConfig::new("getRegular", REGULAR_PATH, Duration::from_millis(1000))
                    .with_skip_probability(0.5),
                JobConfig::new(
                    "getRedeemEstimate",
                    REDEEM_ESTIMATE_PATH,
                    Duration::from_millis(2500),
                )
                .with_elapsed(),
            ],
        }
    }

    pub fn config(self) -> Config {
        Config::with_jobs(self.jobs())
    }
}

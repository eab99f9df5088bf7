use clap::{Parser, ValueEnum};

use parklot::{ConsoleFormat, SimulationConfig};

/// Rendering of the status lines on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<OutputFormat> for ConsoleFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => ConsoleFormat::Text,
            OutputFormat::Json => ConsoleFormat::Json,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "parklot",
    version,
    about = "Simulate cars competing for a fixed number of parking slots"
)]
pub struct Args {
    #[arg(
        short,
        long,
        env = "PARKLOT_CAPACITY",
        default_value_t = SimulationConfig::DEFAULT_CAPACITY,
        help = "Number of parking slots"
    )]
    pub capacity: usize,

    #[arg(
        short = 'n',
        long = "cars",
        env = "PARKLOT_CARS",
        default_value_t = SimulationConfig::DEFAULT_CAR_COUNT,
        help = "Number of cars in the batch"
    )]
    pub cars: usize,

    #[arg(
        long,
        env = "PARKLOT_MIN_HOLD_MS",
        default_value_t = SimulationConfig::DEFAULT_MIN_HOLD_MS,
        help = "Minimum time a car stays parked, in milliseconds"
    )]
    pub min_hold_ms: u64,

    #[arg(
        long,
        env = "PARKLOT_HOLD_SPAN_MS",
        default_value_t = SimulationConfig::DEFAULT_HOLD_SPAN_MS,
        help = "Random extra parking time on top of the minimum, in milliseconds"
    )]
    pub hold_span_ms: u64,

    #[arg(long, env = "PARKLOT_SEED", help = "Seed for reproducible hold times")]
    pub seed: Option<u64>,

    #[arg(
        long,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Status line format"
    )]
    pub format: OutputFormat,
}

impl Args {
    pub fn to_config(&self) -> SimulationConfig {
        let config = SimulationConfig::new()
            .with_capacity(self.capacity)
            .with_car_count(self.cars)
            .with_hold(self.min_hold_ms, self.hold_span_ms);

        match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }
}

// THEORY:
// Configuration is a plain, immutable value. A `SensorArea` receives one at
// construction, validates it once and derives its `Geometry` from it; nothing
// reads configuration from ambient global state afterwards. The tunable
// constants of the two optimizers live here as well, since their defaults were
// chosen empirically for mid-sized maps and should be revisited for other areas.

use crate::error::{DeployError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for a deployment area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaConfig {
    /// Area width in pixels.
    pub width: u32,
    /// Area height in pixels.
    pub height: u32,
    /// Sensor radius in pixels. Region cells are `2 * radius` wide.
    pub radius: u32,
    /// Number of sensors every strategy places.
    pub sensor_count: usize,
    /// Seed for the engine's random source. `None` seeds from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Cap on fallback draws in random placement. `None` retries forever.
    #[serde(default)]
    pub random_retry_limit: Option<u64>,
    #[serde(default)]
    pub annealing: AnnealingConfig,
    #[serde(default)]
    pub genetic: GeneticConfig,
}

/// Simulated annealing schedule and acceptance tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnealingConfig {
    pub initial_temperature: f64,
    /// Geometric cooling factor applied after every step.
    pub cooling_rate: f64,
    /// The run stops once the temperature is at or below this floor.
    pub final_temperature: f64,
    /// Multiplier on the priority delta inside the Metropolis exponent.
    pub acceptance_magnification: f64,
    /// Jitter amplitude as a multiple of `temperature * radius`.
    pub move_scale: f64,
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self {
            initial_temperature: 0.3,
            cooling_rate: 0.9995,
            final_temperature: 0.05,
            acceptance_magnification: 15.0,
            move_scale: 3.0,
        }
    }
}

/// Population-based search tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticConfig {
    /// Number of individuals. `None` uses the sensor count.
    pub population_size: Option<usize>,
    pub generations: usize,
    pub crossover_probability: f64,
    pub mutation_probability: f64,
    /// Per-gene swap probability inside a mutated individual.
    pub gene_mutation_probability: f64,
    pub tournament_size: usize,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: None,
            generations: 40,
            crossover_probability: 0.7,
            mutation_probability: 0.2,
            gene_mutation_probability: 0.05,
            tournament_size: 3,
        }
    }
}

impl AreaConfig {
    /// Creates a configuration with default optimizer settings.
    pub fn new(width: u32, height: u32, radius: u32, sensor_count: usize) -> Self {
        Self {
            width,
            height,
            radius,
            sensor_count,
            seed: None,
            random_retry_limit: None,
            annealing: AnnealingConfig::default(),
            genetic: GeneticConfig::default(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Parses a configuration from JSON and validates it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DeployError::invalid(format!("malformed configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            DeployError::invalid(format!("cannot read configuration {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Checks every parameter. Called before any state is derived from the config.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(DeployError::invalid(format!(
                "area must be non-empty, got {}x{}",
                self.width, self.height
            )));
        }
        if self.width > i32::MAX as u32 / 2 || self.height > i32::MAX as u32 / 2 {
            return Err(DeployError::invalid(format!(
                "area {}x{} is too large",
                self.width, self.height
            )));
        }
        if self.radius == 0 {
            return Err(DeployError::invalid("radius must be positive"));
        }
        if self.radius > i32::MAX as u32 / 4 {
            return Err(DeployError::invalid(format!("radius {} is too large", self.radius)));
        }
        if self.sensor_count == 0 {
            return Err(DeployError::invalid("sensor count must be positive"));
        }
        self.annealing.validate()?;
        self.genetic.validate()
    }
}

impl AnnealingConfig {
    pub fn validate(&self) -> Result<()> {
        let finite = [
            self.initial_temperature,
            self.cooling_rate,
            self.final_temperature,
            self.acceptance_magnification,
            self.move_scale,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            return Err(DeployError::invalid("annealing parameters must be finite"));
        }
        if !(self.final_temperature > 0.0 && self.final_temperature < self.initial_temperature) {
            return Err(DeployError::invalid(
                "annealing requires 0 < final_temperature < initial_temperature",
            ));
        }
        if !(self.cooling_rate > 0.0 && self.cooling_rate < 1.0) {
            return Err(DeployError::invalid("cooling_rate must lie in (0, 1)"));
        }
        if self.acceptance_magnification <= 0.0 {
            return Err(DeployError::invalid("acceptance_magnification must be positive"));
        }
        if self.move_scale < 0.0 {
            return Err(DeployError::invalid("move_scale must not be negative"));
        }
        Ok(())
    }

    /// Number of steps the schedule performs before reaching the floor.
    pub fn step_budget(&self) -> u64 {
        let mut temperature = self.initial_temperature;
        let mut steps = 0;
        while temperature > self.final_temperature {
            temperature *= self.cooling_rate;
            steps += 1;
        }
        steps
    }
}

impl GeneticConfig {
    pub fn validate(&self) -> Result<()> {
        let probabilities = [
            ("crossover_probability", self.crossover_probability),
            ("mutation_probability", self.mutation_probability),
            ("gene_mutation_probability", self.gene_mutation_probability),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(DeployError::invalid(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }
        if self.tournament_size == 0 {
            return Err(DeployError::invalid("tournament_size must be at least 1"));
        }
        if self.population_size == Some(0) {
            return Err(DeployError::invalid("population_size must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_parameters() {
        assert!(AreaConfig::new(8, 8, 0, 3).validate().is_err());
        assert!(AreaConfig::new(8, 8, 1, 0).validate().is_err());
        assert!(AreaConfig::new(0, 8, 1, 3).validate().is_err());
        assert!(AreaConfig::new(8, 8, 1, 3).validate().is_ok());
    }

    #[test]
    fn rejects_inverted_temperature_schedule() {
        let mut config = AreaConfig::new(8, 8, 1, 3);
        config.annealing.final_temperature = 0.5;
        assert!(matches!(config.validate(), Err(DeployError::InvalidParameter(_))));
    }

    #[test]
    fn rejects_probabilities_outside_unit_interval() {
        let mut config = AreaConfig::new(8, 8, 1, 3);
        config.genetic.crossover_probability = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn json_fills_optimizer_defaults() {
        let config = AreaConfig::from_json_str(
            r#"{ "width": 40, "height": 30, "radius": 5, "sensor_count": 4,
                 "annealing": { "cooling_rate": 0.99 } }"#,
        )
        .expect("valid config");
        assert_eq!(config.annealing.cooling_rate, 0.99);
        assert_eq!(config.annealing.initial_temperature, 0.3);
        assert_eq!(config.genetic, GeneticConfig::default());
        assert_eq!(config.seed, None);
    }

    #[test]
    fn default_schedule_runs_a_few_thousand_steps() {
        let steps = AnnealingConfig::default().step_budget();
        // ln(0.05 / 0.3) / ln(0.9995)
        assert!((3580..=3590).contains(&steps), "steps = {steps}");
    }
}

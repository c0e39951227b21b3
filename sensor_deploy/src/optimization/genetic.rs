// THEORY:
// Population-based search over subsets of the greedy candidate pool.
//
// An individual is a list of `sensor_count` pool indices, initially a sample
// without replacement. Its fitness is the total priority of placing the listed
// candidates in order with ids 0, 1, 2, ... on a cleared ledger; the ledger is
// cleared again afterwards so evaluations never see each other's coverage.
//
// Generational loop (every generation replaces the whole population):
// 1.  **Select**: tournament selection, `tournament_size` aspirants drawn with
//     replacement, the fittest wins.
// 2.  **Crossover**: consecutive pairs swap the genes between two cut points
//     with probability `crossover_probability`.
// 3.  **Mutate**: with probability `mutation_probability` an individual visits
//     each gene and, with probability `gene_mutation_probability`, swaps it with
//     another random gene.
// 4.  **Evaluate**: only individuals touched by 2 or 3 are re-scored.
//
// A single-entry hall of fame tracks the best individual ever evaluated; it is
// materialized as the final deployment. Crossover can duplicate a candidate
// inside one individual. The duplicate scores zero and costs that individual a
// sensor, so selection weeds it out.

use crate::core_modules::geometry::Position;
use crate::core_modules::sensor::SensorId;
use crate::error::{DeployError, Result};
use crate::notify::{DeploymentEvent, Strategy};
use crate::sensor_area::{AreaView, DeploymentReport, SensorArea};
use rand::Rng;
use rand::seq::index;

#[derive(Debug, Clone, PartialEq)]
struct Individual {
    genes: Vec<usize>,
    /// `None` until evaluated, and again after crossover or mutation.
    fitness: Option<f64>,
}

impl Individual {
    fn score(&self) -> f64 {
        self.fitness.unwrap_or(f64::NEG_INFINITY)
    }
}

/// Swaps `a[lo..hi]` and `b[lo..hi]` for two random cut points.
fn two_point_crossover<R: Rng + ?Sized>(a: &mut [usize], b: &mut [usize], rng: &mut R) {
    let size = a.len().min(b.len());
    if size < 2 {
        return;
    }
    let first = rng.random_range(1..=size);
    let mut second = rng.random_range(1..size);
    if second >= first {
        second += 1;
    }
    let (lo, hi) = if first < second { (first, second) } else { (second, first) };
    a[lo..hi].swap_with_slice(&mut b[lo..hi]);
}

/// Swaps each gene, with probability `rate`, with another gene of the individual.
fn shuffle_mutation<R: Rng + ?Sized>(genes: &mut [usize], rate: f64, rng: &mut R) {
    let size = genes.len();
    if size < 2 {
        return;
    }
    for i in 0..size {
        if rng.random::<f64>() < rate {
            let mut other = rng.random_range(0..size - 1);
            if other >= i {
                other += 1;
            }
            genes.swap(i, other);
        }
    }
}

/// Index of the fittest of `size` randomly drawn individuals.
fn tournament<R: Rng + ?Sized>(population: &[Individual], size: usize, rng: &mut R) -> usize {
    let mut best = rng.random_range(0..population.len());
    for _ in 1..size {
        let aspirant = rng.random_range(0..population.len());
        if population[aspirant].score() > population[best].score() {
            best = aspirant;
        }
    }
    best
}

impl AreaView<'_> {
    /// Total priority of placing `genes` on a cleared ledger.
    fn fitness(&mut self, pool: &[Position], genes: &[usize]) -> f64 {
        self.ledger.clear();
        let total = genes
            .iter()
            .enumerate()
            .map(|(id, &gene)| {
                self.ledger
                    .cover_and_priority(pool[gene], id as SensorId, &self.oracle)
                    .priority
            })
            .sum();
        self.ledger.clear();
        total
    }

    fn evaluate(&mut self, pool: &[Position], population: &mut [Individual]) {
        for individual in population.iter_mut().filter(|i| i.fitness.is_none()) {
            individual.fitness = Some(self.fitness(pool, &individual.genes));
        }
    }
}

fn record(
    view: &AreaView<'_>,
    generation: usize,
    population: &[Individual],
    hall_of_fame: &mut Option<Individual>,
) {
    for individual in population {
        if hall_of_fame.as_ref().is_none_or(|best| individual.score() > best.score()) {
            *hall_of_fame = Some(individual.clone());
        }
    }
    let mean_fitness = population.iter().map(Individual::score).sum::<f64>() / population.len() as f64;
    let best_fitness = hall_of_fame.as_ref().map_or(0.0, Individual::score);
    view.notifier.notify(&DeploymentEvent::GenerationEvaluated {
        generation,
        best_fitness,
        mean_fitness,
    });
}

impl SensorArea {
    /// Replaces the current deployment with the best candidate subset found by a
    /// genetic search over the greedy candidate pool.
    pub fn deploy_genetic(&mut self) -> Result<DeploymentReport> {
        let pool = self.candidate_positions();
        let sensor_count = self.config().sensor_count;
        if pool.len() < sensor_count {
            return Err(DeployError::invalid(format!(
                "genetic search needs at least {sensor_count} candidates, the pool holds {}",
                pool.len()
            )));
        }
        let settings = self.config().genetic.clone();
        let population_size = settings.population_size.unwrap_or(sensor_count);
        self.clear_deployment();
        let mut view = self.view()?;
        tracing::info!(
            population_size,
            generations = settings.generations,
            candidates = pool.len(),
            "genetic search started"
        );

        let mut population: Vec<Individual> = (0..population_size)
            .map(|_| Individual {
                genes: index::sample(&mut *view.rng, pool.len(), sensor_count).into_vec(),
                fitness: None,
            })
            .collect();
        view.evaluate(&pool, &mut population);
        let mut hall_of_fame: Option<Individual> = None;
        record(&view, 0, &population, &mut hall_of_fame);

        let mut generations = 0;
        let mut cancelled = false;
        for generation in 1..=settings.generations {
            if view.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let mut offspring: Vec<Individual> = (0..population.len())
                .map(|_| population[tournament(&population, settings.tournament_size, &mut *view.rng)].clone())
                .collect();

            for pair in offspring.chunks_exact_mut(2) {
                if view.rng.random::<f64>() < settings.crossover_probability {
                    let (left, right) = pair.split_at_mut(1);
                    two_point_crossover(&mut left[0].genes, &mut right[0].genes, &mut *view.rng);
                    left[0].fitness = None;
                    right[0].fitness = None;
                }
            }
            for individual in offspring.iter_mut() {
                if view.rng.random::<f64>() < settings.mutation_probability {
                    shuffle_mutation(&mut individual.genes, settings.gene_mutation_probability, &mut *view.rng);
                    individual.fitness = None;
                }
            }

            view.evaluate(&pool, &mut offspring);
            population = offspring;
            record(&view, generation, &population, &mut hall_of_fame);
            generations = generation;
        }

        if let Some(best) = hall_of_fame {
            for &gene in &best.genes {
                view.place_scored(pool[gene], Strategy::Genetic);
            }
        }
        let report = view.finish(Strategy::Genetic, generations as u64, cancelled);
        self.check_clusters()?;
        Ok(report)
    }
}

use super::{PopulationConfig, Species};

use rand::prelude::Rng;

/// Allots the number of offspring for each species, based
/// on the members' size-penalized fitness. The counts always
/// sum to the population size.
///
/// Each individual's fitness is divided by a logistic penalty
/// that grows once its species exceeds its share of
/// [`average_number_of_species`]. Species receive offspring in
/// proportion to their penalized fitness, capped at
/// `(1 + crossover threshold)` times their size and rounded
/// stochastically, and the total is then corrected one
/// offspring at a time.
///
/// If no individual has positive fitness, every species
/// keeps its current size.
///
/// [`average_number_of_species`]: PopulationConfig::average_number_of_species
pub(super) fn allot_offspring<R: Rng + ?Sized>(
    species: &[Species],
    config: &PopulationConfig,
    rng: &mut R,
) -> Vec<usize> {
    let population_size = config.size.get();
    let adjusted_sums: Vec<f32> = species
        .iter()
        .map(|s| s.members().map(|i| adjusted_fitness(i.fitness(), s.len(), config)).sum())
        .collect();
    let mean_adjusted_fitness = adjusted_sums.iter().sum::<f32>() / population_size as f32;
    if !(mean_adjusted_fitness > 0.0) {
        return species.iter().map(Species::len).collect();
    }

    let mut current = Vec::with_capacity(species.len());
    let mut potential = Vec::with_capacity(species.len());
    for (s, adjusted_sum) in species.iter().zip(&adjusted_sums) {
        let max_size = ((1.0 + s.crossover_threshold(config)) * s.len() as f32).floor();
        let fractional = (adjusted_sum / mean_adjusted_fitness).min(max_size);
        let lower = fractional.floor();
        let offspring = if rng.gen::<f32>() < fractional - lower {
            lower as isize + 1
        } else {
            lower as isize
        };
        current.push(offspring);
        potential.push(max_size as isize - offspring);
    }

    reconcile(species, population_size as isize, &mut current, &mut potential);
    current.into_iter().map(|c| c.max(0) as usize).collect()
}

/// `fitness / (1 + e^(s * k / n * (n - N / k)))`, with `n` the species
/// size, `N` the population size, `k` the target species count and `s`
/// the penalty steepness.
fn adjusted_fitness(fitness: f32, species_size: usize, config: &PopulationConfig) -> f32 {
    let species_count = config.average_number_of_species;
    if species_count <= 0.0 {
        return fitness;
    }
    let n = species_size as f32;
    let exponent = config.species_size_penalty_steepness * species_count / n
        * (n - config.size.get() as f32 / species_count);
    fitness / (1.0 + exponent.exp())
}

/// Nudges `current` one unit at a time until it sums to `target`.
///
/// Growth goes to the species with the most remaining potential,
/// shrinkage to the one with the least, and ties go to the species
/// whose allotment is furthest from its current size.
fn reconcile(species: &[Species], target: isize, current: &mut [isize], potential: &mut [isize]) {
    let size = |i: usize| species[i].len() as isize;
    let mut difference = target - current.iter().sum::<isize>();

    while difference > 0 {
        let max_potential = (0..current.len())
            .filter(|i| potential[*i] != 0)
            .map(|i| potential[i])
            .max();
        let candidates: Vec<usize> = match max_potential {
            Some(max) => (0..current.len()).filter(|i| potential[*i] == max).collect(),
            None => (0..current.len()).collect(),
        };
        let chosen = match first_max_by_key(&candidates, |i| size(i) - current[i]) {
            Some(chosen) => chosen,
            None => return,
        };
        current[chosen] += 1;
        potential[chosen] -= 1;
        difference -= 1;
    }

    while difference < 0 {
        let min_potential = (0..current.len())
            .filter(|i| current[*i] != 0)
            .map(|i| potential[i])
            .min();
        let candidates: Vec<usize> = match min_potential {
            Some(min) => (0..current.len())
                .filter(|i| current[*i] != 0 && potential[*i] == min)
                .collect(),
            None => return,
        };
        let chosen = match first_max_by_key(&candidates, |i| current[i] - size(i)) {
            Some(chosen) => chosen,
            None => return,
        };
        current[chosen] -= 1;
        potential[chosen] += 1;
        difference += 1;
    }
}

/// Like `Iterator::max_by_key`, but returns the first maximum.
fn first_max_by_key(candidates: &[usize], key: impl Fn(usize) -> isize) -> Option<usize> {
    candidates
        .iter()
        .copied()
        .fold(None, |best: Option<(usize, isize)>, i| {
            let k = key(i);
            match best {
                Some((_, best_key)) if best_key >= k => best,
                _ => Some((i, k)),
            }
        })
        .map(|(i, _)| i)
}

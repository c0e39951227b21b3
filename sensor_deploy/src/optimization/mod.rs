pub mod annealing;
pub mod genetic;

// Business services. Each owns the repositories it needs and shares the pool and cache handles.
pub mod categories;
pub mod clients;
pub mod orders;
pub mod products;

//! Flexible job shop: generator, router, batch machines and sink.

pub mod config;
pub mod dispatch;
pub mod generator;
pub mod machine;
pub mod product;
pub mod router;
pub mod sink;
pub mod system;

pub use config::{ArrivalProcess, MachineConfig, ProductTemplate, ShopConfig};
pub use dispatch::DispatchPolicy;
pub use generator::Generator;
pub use machine::{Machine, MachineMode, MachineStatistics, PendingEvent};
pub use product::{Destination, MachineId, Product, ProductId, ProductSpec, ProductType};
pub use router::{Reservation, Router, RouterCounters, SpoilagePolicy};
pub use sink::Sink;
pub use system::{FlexibleJobShop, MachineReport, RunReport};

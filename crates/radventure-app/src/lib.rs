// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod collection;
pub mod filter;
pub mod forms;
pub mod ids;
pub mod level;
pub mod model;
pub mod notify;
pub mod shop;
pub mod state;
pub mod wizard;

pub use collection::*;
pub use filter::*;
pub use forms::*;
pub use ids::*;
pub use level::*;
pub use model::*;
pub use notify::*;
pub use shop::*;
pub use state::*;
pub use wizard::*;

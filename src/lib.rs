// Copyright 2026 svpileup developers.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

pub mod calling;
pub mod cli;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod reference;
pub mod targets;
pub mod utils;

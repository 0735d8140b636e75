// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod clocks;
pub mod compositor;
pub mod config;
pub mod delay_engine;
pub mod error;
pub mod events;
pub mod frame_queue;
pub mod frames;
pub mod phase;
pub mod scheduler;
pub mod session;
pub mod state_machine;
pub mod timing;
pub mod visual;

pub use clocks::*;
pub use compositor::*;
pub use config::*;
pub use delay_engine::*;
pub use error::*;
pub use events::*;
pub use frame_queue::*;
pub use frames::*;
pub use phase::*;
pub use scheduler::*;
pub use session::*;
pub use state_machine::*;
pub use timing::*;
pub use visual::*;

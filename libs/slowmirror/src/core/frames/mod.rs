// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod captured_frame;
mod pixel_buffer;

pub use captured_frame::CapturedFrame;
pub use pixel_buffer::{PixelBuffer, PixelFormat};

//! Obscura: live webcam effect renderer
//!
//! Captures video from a webcam and renders it through a configurable GPU
//! effect: color inversion, color overlay, a user-supplied GLSL fragment
//! shader, or a spinning lit cube scene.

pub mod capture;
pub mod config;
pub mod effect;
pub mod frame;
pub mod output;
pub mod render_loop;

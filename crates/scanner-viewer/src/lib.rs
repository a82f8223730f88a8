//! Live point cloud preview for RGB-D cameras.
//!
//! Streams depth frames from a sensor pipeline, projects them into a
//! textured point cloud under an orbit camera, and packs the color and
//! infrared feeds into a side panel of aspect-preserving tiles.

pub mod app;
pub mod camera;
pub mod capture;
pub mod config;
pub mod error;
pub mod layout;
pub mod processor;
pub mod renderer;
pub mod session;
pub mod textures;
pub mod ui;

//! Analysis and visualization of district tables: the crime index scaler, heatmaps and the map heat layer.

pub mod geo;
pub mod heatmap;
pub mod scaler;
pub mod theme;

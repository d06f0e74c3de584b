//! Plotly templates shared by the crime plots.

pub mod reds;

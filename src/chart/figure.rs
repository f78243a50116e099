//! Plotly-compatible figure description.
//!
//! Serializes to the `{"data": [...], "layout": {...}}` document accepted by
//! `Plotly.newPlot`.

use serde::Serialize;

use crate::processor::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

impl Figure {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScatterMode {
    #[serde(rename = "lines")]
    Lines,
    #[serde(rename = "markers")]
    Markers,
    #[serde(rename = "lines+markers")]
    LinesMarkers,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trace {
    Bar {
        x: Vec<Value>,
        y: Vec<Option<f64>>,
        name: String,
    },
    Scatter {
        x: Vec<Value>,
        y: Vec<Option<f64>>,
        name: String,
        mode: ScatterMode,
    },
    Heatmap {
        z: Vec<Vec<Option<f64>>>,
        x: Vec<String>,
        y: Vec<String>,
    },
}

impl Trace {
    pub fn name(&self) -> Option<&str> {
        match self {
            Trace::Bar { name, .. } | Trace::Scatter { name, .. } => Some(name),
            Trace::Heatmap { .. } => None,
        }
    }

    pub fn x_len(&self) -> usize {
        match self {
            Trace::Bar { x, .. } | Trace::Scatter { x, .. } => x.len(),
            Trace::Heatmap { x, .. } => x.len(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Layout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xaxis: Option<Axis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaxis: Option<Axis>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Title {
    pub text: String,
}

impl Title {
    pub fn new(text: impl Into<String>) -> Self {
        Title { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub title: Title,
}

impl Axis {
    pub fn titled(text: impl Into<String>) -> Self {
        Axis {
            title: Title::new(text),
        }
    }
}

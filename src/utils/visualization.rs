//! Lattice plotting with gnuplot
//!
//! Series are collected first and rendered onto a single set of axes when
//! the plot is shown or saved.

use gnuplot::{AutoOption, AxesCommon, Caption, Color, Figure, LineWidth, PointSize, PointSymbol};

use crate::common::*;
use crate::lattice::{Lattice, LatticeNode, Link};
use crate::utils::RoadMap;

/// Color palette for consistent styling
pub mod colors {
    pub const BLACK: &str = "#000000";
    pub const RED: &str = "#FF0000";
    pub const GREEN: &str = "#00FF00";
    pub const BLUE: &str = "#0000FF";
    pub const CYAN: &str = "#00FFFF";
    pub const ORANGE: &str = "#FFA500";
    pub const GRAY: &str = "#808080";

    // Semantic colors
    pub const LANE: &str = GRAY;
    pub const NODE: &str = BLACK;
    pub const LONGITUDINAL: &str = BLUE;
    pub const LATERAL: &str = ORANGE;
    pub const ENTRY: &str = GREEN;
    pub const EXIT: &str = RED;
    pub const EGO: &str = CYAN;
}

/// Style for line rendering
#[derive(Debug, Clone)]
pub struct LineStyle {
    pub color: String,
    pub line_width: f64,
    pub caption: Option<String>,
}

impl LineStyle {
    pub fn new(color: &str) -> Self {
        Self {
            color: color.to_string(),
            line_width: 1.0,
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: &str) -> Self {
        self.caption = Some(caption.to_string());
        self
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }
}

/// Style for point rendering
#[derive(Debug, Clone)]
pub struct PointStyle {
    pub color: String,
    pub size: f64,
    pub symbol: char,
    pub caption: Option<String>,
}

impl PointStyle {
    pub fn new(color: &str) -> Self {
        Self {
            color: color.to_string(),
            size: 0.5,
            symbol: 'O',
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: &str) -> Self {
        self.caption = Some(caption.to_string());
        self
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_symbol(mut self, symbol: char) -> Self {
        self.symbol = symbol;
        self
    }
}

#[derive(Debug, Clone)]
enum Series {
    Lines { x: Vec<f64>, y: Vec<f64>, style: LineStyle },
    Points { x: Vec<f64>, y: Vec<f64>, style: PointStyle },
}

/// Top-down plot of road lanes and lattice nodes
#[derive(Debug, Clone)]
pub struct LatticePlot {
    title: String,
    series: Vec<Series>,
    x_range: Option<(f64, f64)>,
    y_range: Option<(f64, f64)>,
}

impl LatticePlot {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            series: Vec::new(),
            x_range: None,
            y_range: None,
        }
    }

    pub fn set_x_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.x_range = Some((min, max));
        self
    }

    pub fn set_y_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.y_range = Some((min, max));
        self
    }

    /// Number of collected series
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn add_line(&mut self, locations: &[Location], style: &LineStyle) -> &mut Self {
        self.series.push(Series::Lines {
            x: locations.iter().map(|l| l.x).collect(),
            y: locations.iter().map(|l| l.y).collect(),
            style: style.clone(),
        });
        self
    }

    pub fn add_points(&mut self, locations: &[Location], style: &PointStyle) -> &mut Self {
        self.series.push(Series::Points {
            x: locations.iter().map(|l| l.x).collect(),
            y: locations.iter().map(|l| l.y).collect(),
            style: style.clone(),
        });
        self
    }

    /// Center line of every lane of the map
    pub fn add_road_map(&mut self, map: &RoadMap) -> &mut Self {
        let style = LineStyle::new(colors::LANE);
        for road in map.roads() {
            for lane in &road.lanes {
                let ends = [
                    road.location_at(lane.id, lane.s_start),
                    road.location_at(lane.id, lane.s_end),
                ];
                self.add_line(&ends, &style);
            }
        }
        self
    }

    /// Nodes of the lattice, one polyline per lane chain, the lateral links,
    /// and its entry and exit
    pub fn add_lattice<R: Router>(&mut self, lattice: &Lattice<R>) -> &mut Self {
        let locations: Vec<Location> = lattice.nodes().map(|n| n.point().location()).collect();
        self.add_points(&locations, &PointStyle::new(colors::NODE).with_caption("Nodes"));

        let chain_style = LineStyle::new(colors::LONGITUDINAL).with_line_width(1.5);
        let chain_heads = lattice
            .nodes()
            .filter(|node| lattice.neighbor(node, Link::Back).is_none());
        for head in chain_heads {
            let chain = Self::chain(lattice, head);
            if chain.len() > 1 {
                self.add_line(&chain, &chain_style);
            }
        }

        let lateral_style = LineStyle::new(colors::LATERAL);
        for node in lattice.nodes() {
            if let Some(left) = lattice.neighbor(node, Link::Left) {
                self.add_line(
                    &[node.point().location(), left.point().location()],
                    &lateral_style,
                );
            }
        }

        self.add_points(
            &[lattice.entry().point().location()],
            &PointStyle::new(colors::ENTRY).with_caption("Entry").with_size(1.5),
        );
        self.add_points(
            &[lattice.exit().point().location()],
            &PointStyle::new(colors::EXIT).with_caption("Exit").with_size(1.5),
        );
        self
    }

    fn chain<R: Router>(lattice: &Lattice<R>, head: &LatticeNode<R::Point>) -> Vec<Location> {
        let mut chain = vec![head.point().location()];
        let mut node = head;
        while let Some(front) = lattice.neighbor(node, Link::Front) {
            // A loop closing on itself ends the chain
            if chain.len() > lattice.len() {
                break;
            }
            chain.push(front.point().location());
            node = front;
        }
        chain
    }

    fn render(&self) -> Figure {
        let mut figure = Figure::new();
        let axes = figure.axes2d();

        for series in &self.series {
            match series {
                Series::Lines { x, y, style } => {
                    let caption = style.caption.as_deref().unwrap_or("");
                    axes.lines(
                        x,
                        y,
                        &[Caption(caption), Color(&style.color), LineWidth(style.line_width)],
                    );
                }
                Series::Points { x, y, style } => {
                    let caption = style.caption.as_deref().unwrap_or("");
                    axes.points(
                        x,
                        y,
                        &[
                            Caption(caption),
                            Color(&style.color),
                            PointSymbol(style.symbol),
                            PointSize(style.size),
                        ],
                    );
                }
            }
        }

        if !self.title.is_empty() {
            axes.set_title(&self.title, &[]);
        }
        axes.set_x_label("X [m]", &[]);
        axes.set_y_label("Y [m]", &[]);
        if let Some((min, max)) = self.x_range {
            axes.set_x_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some((min, max)) = self.y_range {
            axes.set_y_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        axes.set_aspect_ratio(AutoOption::Fix(1.0));

        figure
    }

    /// Open the plot in an interactive gnuplot window
    pub fn show(&self) -> LatticeResult<()> {
        self.render()
            .show()
            .map(|_| ())
            .map_err(|e| LatticeError::Visualization(e.to_string()))
    }

    /// Save plot to PNG file
    pub fn save_png(&self, path: &str, width: u32, height: u32) -> LatticeResult<()> {
        self.render()
            .save_to_png(path, width, height)
            .map_err(|e| LatticeError::Visualization(e.to_string()))
    }
}

impl Default for LatticePlot {
    fn default() -> Self {
        Self::new("")
    }
}

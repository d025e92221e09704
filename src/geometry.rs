//! Oriented bounding quads and the overlap arithmetic used by reconciliation.
//!
//! A [`Polygon`] always has four corners in the order top-left, top-right,
//! bottom-right, bottom-left. Overlap is measured on the derived
//! axis-aligned bounding box, which is computed on demand and never stored.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A quadrilateral with corners ordered clockwise from the top-left.
///
/// Polygons are immutable by convention: every operation returns a new value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f32; 2]>", into = "Vec<[f32; 2]>")]
pub struct Polygon {
    corners: [[f32; 2]; 4],
}

impl Polygon {
    /// Build a polygon from four corners (top-left, top-right, bottom-right, bottom-left).
    ///
    /// Fails when the corner count is wrong, a coordinate is not finite, or
    /// the right-hand / bottom corners lie before the left-hand / top ones.
    pub fn new(corners: &[[f32; 2]]) -> Result<Self> {
        if corners.len() != 4 {
            return Err(Error::Geometry(format!(
                "expected 4 corners, got {}",
                corners.len()
            )));
        }
        if corners.iter().flatten().any(|v| !v.is_finite()) {
            return Err(Error::Geometry("corner coordinates must be finite".into()));
        }

        let [tl, tr, br, bl] = [corners[0], corners[1], corners[2], corners[3]];
        if tr[0] < tl[0] || br[0] < bl[0] {
            return Err(Error::Geometry(format!(
                "right corners lie left of left corners: {:?}",
                corners
            )));
        }
        if bl[1] < tl[1] || br[1] < tr[1] {
            return Err(Error::Geometry(format!(
                "bottom corners lie above top corners: {:?}",
                corners
            )));
        }

        Ok(Self {
            corners: [tl, tr, br, bl],
        })
    }

    /// Build an axis-aligned polygon from `[x0, y0, x1, y1]`.
    pub fn from_bbox(bbox: [f32; 4]) -> Result<Self> {
        let [x0, y0, x1, y1] = bbox;
        Self::new(&[[x0, y0], [x1, y0], [x1, y1], [x0, y1]])
    }

    /// Axis-aligned polygon from extents already known to be ordered.
    fn from_extents(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            corners: [[x0, y0], [x1, y0], [x1, y1], [x0, y1]],
        }
    }

    /// The four corners in clockwise order starting top-left.
    pub fn corners(&self) -> &[[f32; 2]; 4] {
        &self.corners
    }

    /// Derived axis-aligned bounding box `[x0, y0, x1, y1]`.
    pub fn bbox(&self) -> [f32; 4] {
        let mut bbox = [f32::MAX, f32::MAX, f32::MIN, f32::MIN];
        for [x, y] in self.corners {
            bbox[0] = bbox[0].min(x);
            bbox[1] = bbox[1].min(y);
            bbox[2] = bbox[2].max(x);
            bbox[3] = bbox[3].max(y);
        }
        bbox
    }

    pub fn x_start(&self) -> f32 {
        self.bbox()[0]
    }

    pub fn y_start(&self) -> f32 {
        self.bbox()[1]
    }

    pub fn x_end(&self) -> f32 {
        self.bbox()[2]
    }

    pub fn y_end(&self) -> f32 {
        self.bbox()[3]
    }

    pub fn width(&self) -> f32 {
        let [x0, _, x1, _] = self.bbox();
        x1 - x0
    }

    pub fn height(&self) -> f32 {
        let [_, y0, _, y1] = self.bbox();
        y1 - y0
    }

    /// Area of the bounding box.
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Center of the bounding box.
    pub fn center(&self) -> [f32; 2] {
        let [x0, y0, x1, y1] = self.bbox();
        [(x0 + x1) / 2.0, (y0 + y1) / 2.0]
    }

    /// Whether the polygon is at least as wide as it is tall.
    pub fn is_horizontal(&self) -> bool {
        self.height() <= self.width()
    }

    /// Union bounding quad of this polygon and `others`.
    ///
    /// Merging with an empty slice returns `self` unchanged.
    #[must_use = "returns the merged polygon"]
    pub fn merge(&self, others: &[Polygon]) -> Polygon {
        if others.is_empty() {
            return *self;
        }
        let [mut x0, mut y0, mut x1, mut y1] = self.bbox();
        for other in others {
            let [ox0, oy0, ox1, oy1] = other.bbox();
            x0 = x0.min(ox0);
            y0 = y0.min(oy0);
            x1 = x1.max(ox1);
            y1 = y1.max(oy1);
        }
        Self::from_extents(x0, y0, x1, y1)
    }

    /// Union of a list of polygons, `None` when the list is empty.
    pub fn merge_all(polygons: &[Polygon]) -> Option<Polygon> {
        let (first, rest) = polygons.split_first()?;
        Some(first.merge(rest))
    }

    /// Axis-aligned overlap area with `other`.
    pub fn intersection_area(&self, other: &Polygon) -> f32 {
        let [ax0, ay0, ax1, ay1] = self.bbox();
        let [bx0, by0, bx1, by1] = other.bbox();
        let x_overlap = (ax1.min(bx1) - ax0.max(bx0)).max(0.0);
        let y_overlap = (ay1.min(by1) - ay0.max(by0)).max(0.0);
        x_overlap * y_overlap
    }

    /// Fraction of this polygon's area covered by `other`.
    ///
    /// Returns 0 when this polygon has zero area.
    pub fn intersection_pct(&self, other: &Polygon) -> f32 {
        let area = self.area();
        if area <= 0.0 {
            return 0.0;
        }
        self.intersection_area(other) / area
    }

    /// Express the polygon in another coordinate space.
    ///
    /// Every corner is scaled independently in x and y by `new / old`. A
    /// degenerate source size leaves the polygon unchanged.
    #[must_use = "returns the rescaled polygon"]
    pub fn rescale(&self, old_size: (f32, f32), new_size: (f32, f32)) -> Polygon {
        if old_size.0 <= 0.0 || old_size.1 <= 0.0 {
            return *self;
        }
        let sx = new_size.0 / old_size.0;
        let sy = new_size.1 / old_size.1;
        let mut corners = self.corners;
        for corner in corners.iter_mut() {
            corner[0] *= sx;
            corner[1] *= sy;
        }
        Polygon { corners }
    }

    /// Euclidean distance between bounding-box centers.
    pub fn center_distance(&self, other: &Polygon) -> f32 {
        let [ax, ay] = self.center();
        let [bx, by] = other.center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    /// Grow the polygon by a fraction of its width and height on every side.
    #[must_use = "returns the expanded polygon"]
    pub fn expand(&self, x_margin: f32, y_margin: f32) -> Polygon {
        let dx = self.width() * x_margin.max(0.0);
        let dy = self.height() * y_margin.max(0.0);
        let [tl, tr, br, bl] = self.corners;
        Polygon {
            corners: [
                [tl[0] - dx, tl[1] - dy],
                [tr[0] + dx, tr[1] - dy],
                [br[0] + dx, br[1] + dy],
                [bl[0] - dx, bl[1] + dy],
            ],
        }
    }
}

impl TryFrom<Vec<[f32; 2]>> for Polygon {
    type Error = Error;

    fn try_from(corners: Vec<[f32; 2]>) -> Result<Self> {
        Polygon::new(&corners)
    }
}

impl From<Polygon> for Vec<[f32; 2]> {
    fn from(polygon: Polygon) -> Self {
        polygon.corners.to_vec()
    }
}

/// Pairwise intersection areas, `rows × cols`.
pub fn intersection_matrix(rows: &[Polygon], cols: &[Polygon]) -> Vec<Vec<f32>> {
    rows.iter()
        .map(|r| cols.iter().map(|c| r.intersection_area(c)).collect())
        .collect()
}

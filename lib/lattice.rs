//! Leg labels for every tensor on the lattice.
//!
//! Site tensors are stored as `(left, up, right, down, phys)` arrays. When a
//! site is brought into a contraction it is labeled by the bonds it touches:
//! the horizontal bond `H { row, col }` joins `(row, col)` and `(row, col + 1)`,
//! and the vertical bond `V { row, col }` joins `(row, col)` and
//! `(row + 1, col)`. Bonds reaching out of the lattice (`col == -1`,
//! `col == Lx - 1` for `H`; `row == -1`, `row == Ly - 1` for `V`) have
//! dimension 1 and are shared with boundary objects of dimension 1, so edge
//! sites need no special handling.
//!
//! The ket and bra copies of the lattice carry distinct virtual legs, told
//! apart by [`Layer`], and share their physical legs.

use std::fmt;
use crate::tensor::{ Idx, Tensor };

/// Ket or bra copy of the lattice in a double-layer network.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    Ket,
    Bra,
}

impl Layer {
    /// Return the other layer.
    pub fn flip(self) -> Self {
        match self {
            Self::Ket => Self::Bra,
            Self::Bra => Self::Ket,
        }
    }
}

/// Identifies the auxiliary bonds of a boundary MPO.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Chain {
    /// Boundary below the rows in a contraction.
    Bottom,
    /// Boundary above the rows in a contraction.
    Top,
    /// Boundary being fitted during compression.
    Fit,
}

/// A labeled tensor leg.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Leg {
    /// Horizontal virtual bond to the right of `(row, col)`.
    H { row: isize, col: isize, layer: Layer },
    /// Vertical virtual bond above `(row, col)`.
    V { row: isize, col: isize, layer: Layer },
    /// Physical leg of `(row, col)`.
    Phys { row: isize, col: isize },
    /// Bond between columns `col` and `col + 1` of a boundary MPO.
    Aux { chain: Chain, col: isize },
    /// Bond between the two factors of a Trotter gate.
    Gate,
    /// Temporary label.
    Scratch(u8),
}

impl Idx for Leg {
    fn label(&self) -> String { self.to_string() }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = |layer: &Layer| match layer {
            Layer::Ket => "",
            Layer::Bra => "'",
        };
        match self {
            Self::H { row, col, layer }
                => write!(f, "h{}({},{})", tag(layer), row, col),
            Self::V { row, col, layer }
                => write!(f, "v{}({},{})", tag(layer), row, col),
            Self::Phys { row, col } => write!(f, "p({},{})", row, col),
            Self::Aux { chain, col } => write!(f, "{:?}[{}]", chain, col),
            Self::Gate => write!(f, "gate"),
            Self::Scratch(k) => write!(f, "tmp{}", k),
        }
    }
}

/// Labeled tensor with real elements, the currency of all contractions.
pub type LTensor = Tensor<Leg, f64>;

impl Leg {
    /// Horizontal bond to the right of `(row, col)`.
    pub fn h(row: usize, col: isize, layer: Layer) -> Self {
        Self::H { row: row as isize, col, layer }
    }

    /// Vertical bond above `(row, col)`.
    pub fn v(row: isize, col: usize, layer: Layer) -> Self {
        Self::V { row, col: col as isize, layer }
    }

    /// Physical leg of `(row, col)`.
    pub fn phys(row: usize, col: usize) -> Self {
        Self::Phys { row: row as isize, col: col as isize }
    }

    /// Boundary MPO bond to the right of column `col`.
    pub fn aux(chain: Chain, col: isize) -> Self { Self::Aux { chain, col } }

    /// Return the same leg in the other layer; legs without a layer are
    /// returned unchanged.
    pub fn flip_layer(self) -> Self {
        match self {
            Self::H { row, col, layer }
                => Self::H { row, col, layer: layer.flip() },
            Self::V { row, col, layer }
                => Self::V { row, col, layer: layer.flip() },
            other => other,
        }
    }
}

/// Labels of the site `(row, col)` in storage order
/// `[left, up, right, down, phys]`.
pub fn site_legs(row: usize, col: usize, layer: Layer) -> [Leg; 5] {
    let (r, c) = (row as isize, col as isize);
    [
        Leg::H { row: r, col: c - 1, layer },
        Leg::V { row: r, col: c, layer },
        Leg::H { row: r, col: c, layer },
        Leg::V { row: r - 1, col: c, layer },
        Leg::Phys { row: r, col: c },
    ]
}

/// The four virtual labels of the site `(row, col)` in storage order.
pub fn virtual_legs(row: usize, col: usize, layer: Layer) -> [Leg; 4] {
    let [l, u, r, d, _] = site_legs(row, col, layer);
    [l, u, r, d]
}

/// Orientation of a nearest-neighbour bond.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bond {
    /// `(row, col)` and `(row + 1, col)`.
    Vertical,
    /// `(row, col)` and `(row, col + 1)`.
    Horizontal,
}

/// A nearest-neighbour pair of sites, identified by its lower or left member.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Pair {
    pub bond: Bond,
    pub row: usize,
    pub col: usize,
}

impl Pair {
    pub fn vertical(row: usize, col: usize) -> Self {
        Self { bond: Bond::Vertical, row, col }
    }

    pub fn horizontal(row: usize, col: usize) -> Self {
        Self { bond: Bond::Horizontal, row, col }
    }

    /// The lower (vertical) or left (horizontal) site.
    pub fn first(&self) -> (usize, usize) { (self.row, self.col) }

    /// The upper (vertical) or right (horizontal) site.
    pub fn second(&self) -> (usize, usize) {
        match self.bond {
            Bond::Vertical => (self.row + 1, self.col),
            Bond::Horizontal => (self.row, self.col + 1),
        }
    }

    /// The site of the pair that is not `site`.
    pub fn partner(&self, site: (usize, usize)) -> (usize, usize) {
        if site == self.first() { self.second() } else { self.first() }
    }

    /// The bond joining the two sites.
    pub fn shared_leg(&self, layer: Layer) -> Leg {
        match self.bond {
            Bond::Vertical => Leg::v(self.row as isize, self.col, layer),
            Bond::Horizontal => Leg::h(self.row, self.col as isize, layer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbours_share_exactly_one_bond() {
        let a = site_legs(1, 2, Layer::Ket);
        let right = site_legs(1, 3, Layer::Ket);
        let up = site_legs(2, 2, Layer::Ket);
        let common_right: Vec<_> = a.iter().filter(|l| right.contains(l)).collect();
        let common_up: Vec<_> = a.iter().filter(|l| up.contains(l)).collect();
        assert_eq!(common_right, vec![&Pair::horizontal(1, 2).shared_leg(Layer::Ket)]);
        assert_eq!(common_up, vec![&Pair::vertical(1, 2).shared_leg(Layer::Ket)]);
    }

    #[test]
    fn ket_and_bra_share_only_phys() {
        let ket = site_legs(0, 0, Layer::Ket);
        let bra = site_legs(0, 0, Layer::Bra);
        let common: Vec<_> = ket.iter().filter(|l| bra.contains(l)).collect();
        assert_eq!(common, vec![&Leg::phys(0, 0)]);
        assert_eq!(ket[1].flip_layer(), bra[1]);
    }

    #[test]
    fn pair_partners() {
        let p = Pair::vertical(0, 3);
        assert_eq!(p.partner((0, 3)), (1, 3));
        assert_eq!(p.partner((1, 3)), (0, 3));
    }
}

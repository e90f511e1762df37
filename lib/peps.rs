//! The lattice of site tensors.

use ndarray as nd;
use rand::Rng;
use statrs::distribution::Normal;
use crate::{
    error::{ PepsError, PepsResult },
    lattice::{ LTensor, Layer, site_legs },
};

/// Projected entangled pair state on an open `lx × ly` lattice.
///
/// Every site holds a real array of shape `(left, up, right, down, phys)`.
/// Interior bonds have dimension `bond`; bonds reaching out of the lattice
/// have dimension 1.
#[derive(Clone, Debug, PartialEq)]
pub struct Peps {
    lx: usize,
    ly: usize,
    d: usize,
    bond: usize,
    // row-major: (row, col) -> row * lx + col
    data: Vec<nd::Array5<f64>>,
}

impl Peps {
    /// Create a lattice of zero tensors.
    pub fn new(lx: usize, ly: usize, d: usize, bond: usize) -> Self {
        let data: Vec<nd::Array5<f64>>
            = (0..ly)
            .flat_map(|row| (0..lx).map(move |col| (row, col)))
            .map(|(row, col)| {
                nd::Array5::zeros(Self::shape_for(lx, ly, d, bond, row, col))
            })
            .collect();
        Self { lx, ly, d, bond, data }
    }

    fn shape_for(
        lx: usize,
        ly: usize,
        d: usize,
        bond: usize,
        row: usize,
        col: usize,
    ) -> (usize, usize, usize, usize, usize)
    {
        let edge = |at_edge: bool| if at_edge { 1 } else { bond };
        (
            edge(col == 0),
            edge(row == ly - 1),
            edge(col == lx - 1),
            edge(row == 0),
            d,
        )
    }

    /// Create a lattice with elements drawn uniformly from `[-1, 1)`.
    pub fn random<R>(lx: usize, ly: usize, d: usize, bond: usize, rng: &mut R)
        -> Self
    where R: Rng + ?Sized
    {
        let mut peps = Self::new(lx, ly, d, bond);
        peps.data.iter_mut()
            .for_each(|site| {
                site.map_inplace(|x| { *x = rng.gen_range(-1.0..1.0); });
            });
        peps
    }

    /// Create the product Néel state, with the physical state alternating
    /// between `d - 1` and `0` on a checkerboard, plus Gaussian noise of
    /// standard deviation `noise` on every element.
    pub fn neel<R>(
        lx: usize,
        ly: usize,
        d: usize,
        bond: usize,
        noise: f64,
        rng: &mut R,
    ) -> PepsResult<Self>
    where R: Rng + ?Sized
    {
        let mut peps = Self::new(lx, ly, d, bond);
        for row in 0..ly {
            for col in 0..lx {
                let s = if (row + col) % 2 == 0 { d - 1 } else { 0 };
                peps.get_mut(row, col)[[0, 0, 0, 0, s]] = 1.0;
            }
        }
        if noise > 0.0 {
            let dist = Normal::new(0.0, noise)
                .map_err(|e| PepsError::InvalidParams(e.to_string()))?;
            peps.data.iter_mut()
                .for_each(|site| {
                    site.map_inplace(|x| { *x += rng.sample(dist); });
                });
        }
        Ok(peps)
    }

    pub fn lx(&self) -> usize { self.lx }

    pub fn ly(&self) -> usize { self.ly }

    /// Physical dimension.
    pub fn d(&self) -> usize { self.d }

    /// Interior bond dimension.
    pub fn bond(&self) -> usize { self.bond }

    /// Return the expected array shape at `(row, col)`.
    pub fn site_shape(&self, row: usize, col: usize) -> [usize; 5] {
        let (l, u, r, d, p)
            = Self::shape_for(self.lx, self.ly, self.d, self.bond, row, col);
        [l, u, r, d, p]
    }

    /// Borrow the array at `(row, col)`.
    ///
    /// *Panics* if the site is out of bounds.
    pub fn get(&self, row: usize, col: usize) -> &nd::Array5<f64> {
        &self.data[row * self.lx + col]
    }

    /// Mutably borrow the array at `(row, col)`.
    ///
    /// *Panics* if the site is out of bounds.
    pub fn get_mut(&mut self, row: usize, col: usize) -> &mut nd::Array5<f64> {
        &mut self.data[row * self.lx + col]
    }

    /// Overwrite the array at `(row, col)`, checking its shape.
    pub fn set(&mut self, row: usize, col: usize, site: nd::Array5<f64>)
        -> PepsResult<()>
    {
        let expected = self.site_shape(row, col);
        if site.shape() != expected {
            return Err(PepsError::SiteShape {
                row,
                col,
                expected: expected.to_vec(),
                got: site.shape().to_vec(),
            });
        }
        self.data[row * self.lx + col] = site;
        Ok(())
    }

    /// Return the site `(row, col)` labeled in the given layer.
    pub fn labeled(&self, row: usize, col: usize, layer: Layer)
        -> PepsResult<LTensor>
    {
        let site = self.get(row, col).clone().into_dyn();
        Ok(LTensor::from_array(site_legs(row, col, layer), site)?)
    }

    /// Return the ket copy of the site `(row, col)`.
    pub fn ket(&self, row: usize, col: usize) -> PepsResult<LTensor> {
        self.labeled(row, col, Layer::Ket)
    }

    /// Return the bra copy of the site `(row, col)`.
    pub fn bra(&self, row: usize, col: usize) -> PepsResult<LTensor> {
        self.labeled(row, col, Layer::Bra)
    }

    /// Overwrite the site `(row, col)` from a tensor carrying its ket labels.
    pub fn set_ket(&mut self, row: usize, col: usize, ket: &LTensor)
        -> PepsResult<()>
    {
        let site: nd::Array5<f64>
            = ket.to_array(&site_legs(row, col, Layer::Ket))?
            .into_dimensionality()?;
        self.set(row, col, site)
    }

    /// Multiply every site by `x`.
    pub fn scal(&mut self, x: f64) {
        self.data.iter_mut().for_each(|site| { *site *= x; });
    }

    /// Rescale every site to have Frobenius norm `target`. Sites that are
    /// identically zero are left alone.
    pub fn rescale_tensors(&mut self, target: f64) {
        self.data.iter_mut()
            .for_each(|site| {
                let nrm = site.iter().map(|x| x * x).sum::<f64>().sqrt();
                if nrm > 0.0 { *site *= target / nrm; }
            });
    }

    /// Return `true` if every element of every site is finite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|site| site.iter().all(|x| x.is_finite()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{ SeedableRng, rngs::StdRng };

    #[test]
    fn edge_shapes() {
        let peps = Peps::new(3, 4, 2, 3);
        assert_eq!(peps.site_shape(0, 0), [1, 3, 3, 1, 2]);
        assert_eq!(peps.site_shape(3, 2), [3, 1, 1, 3, 2]);
        assert_eq!(peps.site_shape(1, 1), [3, 3, 3, 3, 2]);
        assert_eq!(peps.get(3, 2).shape(), &[3, 1, 1, 3, 2]);
    }

    #[test]
    fn set_checks_shape() {
        let mut peps = Peps::new(2, 2, 2, 2);
        let bad = nd::Array5::zeros((2, 2, 2, 2, 2));
        assert!(matches!(
            peps.set(0, 0, bad),
            Err(PepsError::SiteShape { row: 0, col: 0, .. }),
        ));
    }

    #[test]
    fn ket_round_trip_through_labels() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut peps = Peps::random(3, 3, 2, 2, &mut rng);
        let ket = peps.ket(1, 2).unwrap();
        let mut scaled = ket.clone();
        scaled.scale(2.0);
        peps.set_ket(1, 2, &scaled).unwrap();
        let back = peps.ket(1, 2).unwrap();
        assert!((back.norm() - 2.0 * ket.norm()).abs() < 1e-12);
    }

    #[test]
    fn neel_pattern() {
        let mut rng = StdRng::seed_from_u64(0);
        let peps = Peps::neel(2, 2, 2, 2, 0.0, &mut rng).unwrap();
        assert_eq!(peps.get(0, 0)[[0, 0, 0, 0, 1]], 1.0);
        assert_eq!(peps.get(0, 1)[[0, 0, 0, 0, 0]], 1.0);
        assert_eq!(peps.get(1, 0)[[0, 0, 0, 0, 0]], 1.0);
        assert_eq!(peps.get(1, 1)[[0, 0, 0, 0, 1]], 1.0);
    }

    #[test]
    fn rescale_sets_norms() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut peps = Peps::random(2, 3, 2, 2, &mut rng);
        peps.rescale_tensors(0.5);
        for row in 0..3 {
            for col in 0..2 {
                let nrm = peps.ket(row, col).unwrap().norm();
                assert!((nrm - 0.5).abs() < 1e-12);
            }
        }
    }
}

//! Parameter vectors and their binding onto section shapes.

use cad_kernel::Dual;
use serde::{Deserialize, Serialize};

/// Values of a case's parameters with one derivative direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSet {
    pub values: Vec<f64>,
    pub dots: Vec<f64>,
}

impl ParamSet {
    pub fn new(values: Vec<f64>) -> Self {
        let dots = vec![0.0; values.len()];
        Self { values, dots }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Same values, derivative along parameter `i` only.
    pub fn unit(&self, i: usize) -> Self {
        let mut dots = vec![0.0; self.values.len()];
        dots[i] = 1.0;
        Self {
            values: self.values.clone(),
            dots,
        }
    }

    /// Parameter `i` nudged by `step`, no derivative.
    pub fn perturbed(&self, i: usize, step: f64) -> Self {
        let mut values = self.values.clone();
        values[i] += step;
        Self::new(values)
    }

    pub fn dual(&self, i: usize) -> Dual {
        Dual::new(self.values[i], self.dots[i])
    }
}

/// Where one local parameter of a section comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Bind {
    Param(usize),
    Fixed(f64),
}

impl Bind {
    pub fn resolve(&self, params: &ParamSet) -> Dual {
        match self {
            Bind::Param(i) => params.dual(*i),
            Bind::Fixed(v) => Dual::constant(*v),
        }
    }
}

/// `Param(start)`, `Param(start + 1)`, ... for `n` parameters.
pub fn params(start: usize, n: usize) -> Vec<Bind> {
    (start..start + n).map(Bind::Param).collect()
}

pub fn fixed(values: &[f64]) -> Vec<Bind> {
    values.iter().map(|v| Bind::Fixed(*v)).collect()
}

pub fn resolve(binds: &[Bind], params: &ParamSet) -> Vec<Dual> {
    binds.iter().map(|b| b.resolve(params)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_sets_single_direction() {
        let p = ParamSet::new(vec![1.0, 2.0, 3.0]).unit(1);
        assert_eq!(p.dots, vec![0.0, 1.0, 0.0]);
        assert_eq!(p.values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_perturbed_clears_dots() {
        let p = ParamSet::new(vec![1.0, 2.0]).unit(0).perturbed(0, 0.5);
        assert_eq!(p.values, vec![1.5, 2.0]);
        assert_eq!(p.dots, vec![0.0, 0.0]);
    }

    #[test]
    fn test_binds_mix_params_and_constants() {
        let p = ParamSet::new(vec![4.0, 5.0]).unit(1);
        let mut binds = params(0, 2);
        binds.push(Bind::Fixed(7.0));
        let d = resolve(&binds, &p);
        assert_eq!(d[0], Dual::new(4.0, 0.0));
        assert_eq!(d[1], Dual::new(5.0, 1.0));
        assert_eq!(d[2], Dual::new(7.0, 0.0));
    }
}

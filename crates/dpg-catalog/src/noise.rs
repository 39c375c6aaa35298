//! # Noise Samplers
//!
//! Per-type noise addition for the catalog measurements. Floats receive
//! continuous noise; integers receive discrete noise (two-sided geometric),
//! so integer outputs stay integers and the discrete mechanism's privacy
//! bound applies unchanged.
//!
//! Samplers draw from the caller's RNG; measurements pass
//! `rand::thread_rng()` on every invocation.

use rand::Rng;
use rand_distr::{Distribution, Exp, Geometric, Normal};

use dpg_core::{DpgError, Fallible, Number, Primitive};

/// Types that can be perturbed with Laplace-shaped noise of a given scale.
pub trait LaplaceNoise: Number {
    /// `self` plus noise with scale `scale`. A zero scale adds nothing.
    fn add_laplace<R: Rng + ?Sized>(self, scale: f64, rng: &mut R) -> Fallible<Self>;
}

/// Types that can be perturbed with Gaussian noise of a given scale.
pub trait GaussianNoise: Number {
    /// `self` plus noise with standard deviation `scale`.
    fn add_gaussian<R: Rng + ?Sized>(self, scale: f64, rng: &mut R) -> Fallible<Self>;
}

fn sampler_error(what: &str, scale: f64, e: impl std::fmt::Display) -> DpgError {
    DpgError::InvocationFailure(format!("cannot sample {what} noise at scale {scale}: {e}"))
}

/// Continuous Laplace noise, as the difference of two exponentials.
pub fn sample_laplace<R: Rng + ?Sized>(scale: f64, rng: &mut R) -> Fallible<f64> {
    if scale == 0.0 {
        return Ok(0.0);
    }
    let exp = Exp::new(1.0 / scale).map_err(|e| sampler_error("laplace", scale, e))?;
    Ok(exp.sample(rng) - exp.sample(rng))
}

/// Two-sided geometric noise: `P(k) ∝ exp(-|k| / scale)`.
pub fn sample_discrete_laplace<R: Rng + ?Sized>(scale: f64, rng: &mut R) -> Fallible<i128> {
    if scale == 0.0 {
        return Ok(0);
    }
    // success probability 1 - exp(-1/scale)
    let p = -(-1.0 / scale).exp_m1();
    let geometric = Geometric::new(p).map_err(|e| sampler_error("geometric", scale, e))?;
    Ok(i128::from(geometric.sample(rng)) - i128::from(geometric.sample(rng)))
}

/// Gaussian noise with standard deviation `scale`.
pub fn sample_gaussian<R: Rng + ?Sized>(scale: f64, rng: &mut R) -> Fallible<f64> {
    if scale == 0.0 {
        return Ok(0.0);
    }
    let normal = Normal::new(0.0, scale).map_err(|e| sampler_error("gaussian", scale, e))?;
    Ok(normal.sample(rng))
}

macro_rules! impl_float_noise {
    ($($ty:ty),*) => {$(
        impl LaplaceNoise for $ty {
            fn add_laplace<R: Rng + ?Sized>(self, scale: f64, rng: &mut R) -> Fallible<Self> {
                let noisy = f64::from(self) + sample_laplace(scale, rng)?;
                Self::from_f64_nearest(noisy)
                    .ok_or_else(|| DpgError::Overflow(format!("{noisy} does not fit in {}", Self::KIND)))
            }
        }

        impl GaussianNoise for $ty {
            fn add_gaussian<R: Rng + ?Sized>(self, scale: f64, rng: &mut R) -> Fallible<Self> {
                let noisy = f64::from(self) + sample_gaussian(scale, rng)?;
                Self::from_f64_nearest(noisy)
                    .ok_or_else(|| DpgError::Overflow(format!("{noisy} does not fit in {}", Self::KIND)))
            }
        }
    )*};
}

impl_float_noise!(f32, f64);

macro_rules! impl_int_noise {
    ($($ty:ty),*) => {$(
        impl LaplaceNoise for $ty {
            // Saturates at the type bounds.
            #[allow(clippy::cast_lossless, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            fn add_laplace<R: Rng + ?Sized>(self, scale: f64, rng: &mut R) -> Fallible<Self> {
                let noisy = (self as i128).saturating_add(sample_discrete_laplace(scale, rng)?);
                let clamped = noisy.clamp(<$ty>::MIN as i128, <$ty>::MAX as i128);
                Ok(clamped as $ty)
            }
        }
    )*};
}

impl_int_noise!(i32, i64, u32, u64, usize);

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_zero_scale_is_exact() {
        let mut rng = rng();
        assert_eq!(3.5f64.add_laplace(0.0, &mut rng).unwrap(), 3.5);
        assert_eq!(3.5f64.add_gaussian(0.0, &mut rng).unwrap(), 3.5);
        assert_eq!(7i32.add_laplace(0.0, &mut rng).unwrap(), 7);
    }

    #[test]
    fn test_laplace_is_centered() {
        let mut rng = rng();
        let n = 20_000;
        let mean = (0..n)
            .map(|_| sample_laplace(1.0, &mut rng).unwrap())
            .sum::<f64>()
            / f64::from(n);
        assert!(mean.abs() < 0.05, "mean {mean}");
    }

    #[test]
    fn test_discrete_laplace_is_centered_and_spread() {
        let mut rng = rng();
        let draws: Vec<i128> = (0..20_000)
            .map(|_| sample_discrete_laplace(2.0, &mut rng).unwrap())
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let mean = draws.iter().sum::<i128>() as f64 / draws.len() as f64;
        assert!(mean.abs() < 0.1, "mean {mean}");
        assert!(draws.iter().any(|k| *k != 0));
    }

    #[test]
    fn test_integer_noise_saturates() {
        let mut rng = rng();
        for _ in 0..100 {
            let x = u32::MAX.add_laplace(1000.0, &mut rng).unwrap();
            let y = 0u32.add_laplace(1000.0, &mut rng).unwrap();
            assert!(x > 0 && y < u32::MAX);
        }
    }

    #[test]
    fn test_gaussian_rejects_bad_scale() {
        assert!(matches!(
            sample_gaussian(f64::NAN, &mut rng()),
            Err(DpgError::InvocationFailure(_))
        ));
    }
}

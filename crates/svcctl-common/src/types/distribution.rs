//! Bucketed distributions of sampled values
//!
//! Bucket 0 is the underflow bucket and the last bucket the overflow bucket,
//! so `bucket_counts.len() == num_finite_buckets + 2`.

use serde::{Deserialize, Serialize};

use crate::error::{MergeError, ValidationError};

/// How bucket boundaries are laid out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketOptions {
    Linear {
        num_finite_buckets: usize,
        width: f64,
        offset: f64,
    },
    Exponential {
        num_finite_buckets: usize,
        growth_factor: f64,
        scale: f64,
    },
    Explicit {
        bounds: Vec<f64>,
    },
}

impl BucketOptions {
    pub fn num_finite_buckets(&self) -> usize {
        match self {
            BucketOptions::Linear {
                num_finite_buckets, ..
            }
            | BucketOptions::Exponential {
                num_finite_buckets, ..
            } => *num_finite_buckets,
            BucketOptions::Explicit { bounds } => bounds.len().saturating_sub(1),
        }
    }

    /// Reject layouts whose bucket boundaries do not strictly increase
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            BucketOptions::Linear { width, offset, .. } => {
                if !(width.is_finite() && *width > 0.0) {
                    return Err(ValidationError::InvalidBuckets("linear width must be > 0"));
                }
                if !offset.is_finite() {
                    return Err(ValidationError::InvalidBuckets("linear offset must be finite"));
                }
            }
            BucketOptions::Exponential {
                growth_factor,
                scale,
                ..
            } => {
                if !(growth_factor.is_finite() && *growth_factor > 1.0) {
                    return Err(ValidationError::InvalidBuckets(
                        "exponential growth factor must be > 1",
                    ));
                }
                if !(scale.is_finite() && *scale > 0.0) {
                    return Err(ValidationError::InvalidBuckets("exponential scale must be > 0"));
                }
            }
            BucketOptions::Explicit { bounds } => {
                if bounds.iter().any(|b| !b.is_finite()) {
                    return Err(ValidationError::InvalidBuckets("explicit bounds must be finite"));
                }
            }
        }
        Ok(())
    }

    /// Index into `bucket_counts` for a sample
    pub fn bucket_index(&self, sample: f64) -> usize {
        let n = self.num_finite_buckets();
        match self {
            BucketOptions::Linear { width, offset, .. } => {
                if sample < *offset {
                    return 0;
                }
                finite_bucket((sample - offset) / width, n)
            }
            BucketOptions::Exponential {
                growth_factor,
                scale,
                ..
            } => {
                if sample < *scale {
                    return 0;
                }
                finite_bucket((sample / scale).ln() / growth_factor.ln(), n)
            }
            BucketOptions::Explicit { bounds } => bounds.iter().take_while(|b| **b <= sample).count(),
        }
    }
}

/// Map a position counted in buckets past the first finite bound to an index.
/// NaN and anything past the last finite bucket land in the overflow bucket.
fn finite_bucket(position: f64, n: usize) -> usize {
    let position = position.floor();
    if position.is_nan() || position >= n as f64 {
        n + 1
    } else {
        position.max(0.0) as usize + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub count: i64,
    pub mean: f64,
    pub minimum: f64,
    pub maximum: f64,
    pub sum_of_squared_deviation: f64,
    pub bucket_counts: Vec<i64>,
    pub bucket_options: BucketOptions,
}

impl Distribution {
    fn empty(bucket_options: BucketOptions) -> Self {
        let buckets = bucket_options.num_finite_buckets() + 2;
        Self {
            count: 0,
            mean: 0.0,
            minimum: 0.0,
            maximum: 0.0,
            sum_of_squared_deviation: 0.0,
            bucket_counts: vec![0; buckets],
            bucket_options,
        }
    }

    /// Empty distribution over validated bucket options
    pub fn new(bucket_options: BucketOptions) -> Result<Self, ValidationError> {
        bucket_options.validate()?;
        Ok(Self::empty(bucket_options))
    }

    pub fn linear(num_finite_buckets: usize, width: f64, offset: f64) -> Result<Self, ValidationError> {
        Self::new(BucketOptions::Linear {
            num_finite_buckets,
            width,
            offset,
        })
    }

    pub fn exponential(
        num_finite_buckets: usize,
        growth_factor: f64,
        scale: f64,
    ) -> Result<Self, ValidationError> {
        Self::new(BucketOptions::Exponential {
            num_finite_buckets,
            growth_factor,
            scale,
        })
    }

    pub fn explicit(mut bounds: Vec<f64>) -> Result<Self, ValidationError> {
        bounds.sort_by(|a, b| a.total_cmp(b));
        bounds.dedup();
        Self::new(BucketOptions::Explicit { bounds })
    }

    /// Record one sample (Welford update)
    pub fn add_sample(&mut self, sample: f64) {
        if self.count == 0 {
            self.minimum = sample;
            self.maximum = sample;
        } else {
            self.minimum = self.minimum.min(sample);
            self.maximum = self.maximum.max(sample);
        }

        self.count += 1;
        let delta = sample - self.mean;
        self.mean += delta / self.count as f64;
        self.sum_of_squared_deviation += delta * (sample - self.mean);

        let idx = self.bucket_options.bucket_index(sample);
        if let Some(bucket) = self.bucket_counts.get_mut(idx) {
            *bucket += 1;
        }
    }

    /// Combine with another distribution over identical buckets
    pub fn merged(&self, other: &Distribution) -> Result<Distribution, MergeError> {
        if self.bucket_options != other.bucket_options
            || self.bucket_counts.len() != other.bucket_counts.len()
        {
            return Err(MergeError::BucketMismatch);
        }
        if other.count == 0 {
            return Ok(self.clone());
        }
        if self.count == 0 {
            return Ok(other.clone());
        }

        let count = self
            .count
            .checked_add(other.count)
            .ok_or(MergeError::Overflow("distribution count"))?;
        let (n_a, n_b, n) = (self.count as f64, other.count as f64, count as f64);
        let mean = (self.mean * n_a + other.mean * n_b) / n;
        let delta = other.mean - self.mean;
        let sum_of_squared_deviation = self.sum_of_squared_deviation
            + other.sum_of_squared_deviation
            + delta * delta * n_a * n_b / n;

        let bucket_counts = self
            .bucket_counts
            .iter()
            .zip(&other.bucket_counts)
            .map(|(a, b)| a.checked_add(*b).ok_or(MergeError::Overflow("bucket count")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Distribution {
            count,
            mean,
            minimum: self.minimum.min(other.minimum),
            maximum: self.maximum.max(other.maximum),
            sum_of_squared_deviation,
            bucket_counts,
            bucket_options: self.bucket_options.clone(),
        })
    }
}

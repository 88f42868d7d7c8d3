//! Split a full bidirectional sweep into its four monotonic branches.
//!
//! A sweep visits both current extrema. Between them (in array order) the
//! sample with the smallest `|I|` is taken as the zero crossing. Branches are
//! closed index ranges, so neighbouring branches share their boundary sample.
//!
//! Both sweep directions are handled:
//!
//! ```text
//! max first:  [0..=max] [max..=zero] [zero..=min] [min..end]
//! min first:  [zero..=max] [max..end] [0..=min] [min..=zero]
//! ```

use crate::domain::{Segment, Segments};
use crate::error::{IvError, IvResult};
use crate::math::{argmax, argmin};

pub fn split_segments(current: &[f64], voltage: &[f64]) -> IvResult<Segments> {
    if current.len() != voltage.len() {
        return Err(IvError::DataShape(format!(
            "current and voltage lengths differ ({} vs {})",
            current.len(),
            voltage.len()
        )));
    }
    let (Some(max_index), Some(min_index)) = (argmax(current), argmin(current)) else {
        return Err(IvError::DataShape("cannot split an empty sweep".into()));
    };
    if max_index == min_index {
        return Err(IvError::DataShape(format!(
            "current maximum and minimum coincide at index {max_index}; sweep cannot be split"
        )));
    }

    let (down, up) = if max_index < min_index {
        (max_index, min_index)
    } else {
        (min_index, max_index)
    };
    let abs_between: Vec<f64> = current[down..up].iter().map(|v| v.abs()).collect();
    let zero_index = down + argmin(&abs_between).unwrap_or(0);
    let last = current.len() - 1;

    let slice = |start: usize, end: usize| Segment {
        start,
        end,
        current: current[start..=end].to_vec(),
        voltage: voltage[start..=end].to_vec(),
    };

    let branches = if max_index < min_index {
        [
            slice(0, down),
            slice(down, zero_index),
            slice(zero_index, up),
            slice(up, last),
        ]
    } else {
        [
            slice(zero_index, up),
            slice(up, last),
            slice(0, down),
            slice(down, zero_index),
        ]
    };

    Ok(Segments { branches })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Branch;

    fn triangle() -> Vec<f64> {
        vec![0.0, 1.0, 2.0, 3.0, 2.0, 1.0, 0.0, -1.0, -2.0, -3.0, -2.0, -1.0, 0.0]
    }

    #[test]
    fn triangle_wave_boundaries() {
        let i = triangle();
        let v: Vec<f64> = i.iter().map(|x| 2.0 * x).collect();
        let segs = split_segments(&i, &v).unwrap();

        let bounds: Vec<(usize, usize)> = segs.branches.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(bounds, vec![(0, 3), (3, 6), (6, 9), (9, 12)]);

        // Adjacent branches share exactly their boundary sample.
        for w in segs.branches.windows(2) {
            assert_eq!(w[0].end, w[1].start);
            assert_eq!(w[0].current.last(), w[1].current.first());
        }
        assert_eq!(segs.get(Branch::Increasing).current, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(segs.get(Branch::IncreasingToZero).voltage, vec![-6.0, -4.0, -2.0, 0.0]);
    }

    #[test]
    fn reversed_sweep_assigns_branches_by_polarity() {
        let i: Vec<f64> = triangle().into_iter().map(|x| -x).collect();
        let v = i.clone();
        let segs = split_segments(&i, &v).unwrap();

        // min at 3, zero at 6, max at 9
        assert_eq!((segs.get(Branch::Increasing).start, segs.get(Branch::Increasing).end), (6, 9));
        assert_eq!((segs.get(Branch::DecreasingToZero).start, segs.get(Branch::DecreasingToZero).end), (9, 12));
        assert_eq!((segs.get(Branch::Decreasing).start, segs.get(Branch::Decreasing).end), (0, 3));
        assert_eq!((segs.get(Branch::IncreasingToZero).start, segs.get(Branch::IncreasingToZero).end), (3, 6));
        assert!(segs.get(Branch::Increasing).current.iter().all(|x| *x >= 0.0));
        assert!(segs.get(Branch::Decreasing).current.iter().all(|x| *x <= 0.0));
    }

    #[test]
    fn segment_lengths_cover_the_sweep() {
        let i = triangle();
        let segs = split_segments(&i, &i).unwrap();
        let total: usize = segs.branches.iter().map(|s| s.len()).sum();
        // Three shared boundaries.
        assert_eq!(total, i.len() + 3);
    }

    #[test]
    fn single_point_sweep_is_rejected() {
        assert!(matches!(split_segments(&[1.0], &[0.0]), Err(IvError::DataShape(_))));
        assert!(matches!(
            split_segments(&[0.5, 0.5, 0.5], &[0.0, 0.0, 0.0]),
            Err(IvError::DataShape(_))
        ));
    }
}

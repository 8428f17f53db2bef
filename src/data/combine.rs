use crate::error::{Error, Result};

use super::model::{Channel, ChannelRange, ChannelSelection};

/// Resolve a selection into exactly one weight per channel.
fn weights_for(selection: &ChannelSelection, channel_count: usize) -> Result<Vec<f64>> {
    match selection {
        ChannelSelection::All => Ok(vec![1.0; channel_count]),
        ChannelSelection::Single(index) => {
            if *index >= channel_count {
                return Err(Error::IndexOutOfRange {
                    index: *index,
                    available: channel_count,
                });
            }
            let mut weights = vec![0.0; channel_count];
            weights[*index] = 1.0;
            Ok(weights)
        }
        ChannelSelection::Weighted(given) => {
            let mut weights = given.clone();
            weights.resize(channel_count, 0.0);
            Ok(weights)
        }
    }
}

/// Combine channels into one sequence in the canonical range.
///
/// Each output index up to the longest channel is the weighted sum of the
/// range-normalized channel values, divided by the sum of absolute weights.
/// Channels too short for an index contribute 0.0; a zero weight total gives
/// 0.0 everywhere.  Missing ranges default to [-1.0, 1.0].
pub fn combine_channels(
    channels: &[Channel],
    ranges: &[Option<ChannelRange>],
    selection: &ChannelSelection,
) -> Result<Vec<f64>> {
    let weights = weights_for(selection, channels.len())?;
    let weight_total: f64 = weights.iter().map(|w| w.abs()).sum();
    let longest = channels.iter().map(Vec::len).max().unwrap_or(0);

    let ranges: Vec<ChannelRange> = (0..channels.len())
        .map(|j| ranges.get(j).copied().flatten().unwrap_or_default())
        .collect();

    let combined = (0..longest)
        .map(|i| {
            if weight_total == 0.0 {
                return 0.0;
            }
            let sum: f64 = channels
                .iter()
                .zip(&weights)
                .zip(&ranges)
                .map(|((channel, weight), range)| {
                    let value = channel.get(i).copied().unwrap_or(0.0);
                    weight * range.normalize(value)
                })
                .sum();
            sum / weight_total
        })
        .collect();

    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_channels_cancel() {
        let channels = vec![vec![1.0, 1.0], vec![-1.0, -1.0]];
        let out = combine_channels(
            &channels,
            &[],
            &ChannelSelection::Weighted(vec![1.0, 1.0]),
        )
        .unwrap();
        assert_eq!(out, vec![0.0, 0.0]);
    }

    #[test]
    fn single_selection_uses_one_channel() {
        let channels = vec![vec![0.1, 0.2], vec![0.5, -0.5]];
        let out = combine_channels(&channels, &[], &ChannelSelection::Single(1)).unwrap();
        assert_eq!(out, vec![0.5, -0.5]);
    }

    #[test]
    fn out_of_range_selection_fails() {
        let channels = vec![vec![0.0]];
        let err = combine_channels(&channels, &[], &ChannelSelection::Single(3)).unwrap_err();
        assert!(matches!(
            err,
            Error::IndexOutOfRange { index: 3, available: 1 }
        ));
    }

    #[test]
    fn ranges_normalize_before_weighting() {
        let channels = vec![vec![0.0, 10.0, 5.0]];
        let ranges = vec![Some(ChannelRange::new(0.0, 10.0))];
        let out = combine_channels(&channels, &ranges, &ChannelSelection::All).unwrap();
        assert_eq!(out, vec![-1.0, 1.0, 0.0]);
    }

    #[test]
    fn weights_are_padded_and_truncated() {
        let channels = vec![vec![0.5], vec![1.0], vec![-1.0]];
        let padded =
            combine_channels(&channels, &[], &ChannelSelection::Weighted(vec![2.0])).unwrap();
        assert_eq!(padded, vec![0.5]);

        let truncated = combine_channels(
            &channels[..1],
            &[],
            &ChannelSelection::Weighted(vec![1.0, 5.0, 5.0]),
        )
        .unwrap();
        assert_eq!(truncated, vec![0.5]);
    }

    #[test]
    fn negative_weights_invert() {
        let channels = vec![vec![0.5], vec![0.25]];
        let out =
            combine_channels(&channels, &[], &ChannelSelection::Weighted(vec![1.0, -1.0]))
                .unwrap();
        assert_eq!(out, vec![0.125]);
    }

    #[test]
    fn zero_weights_give_silence() {
        let channels = vec![vec![0.7, -0.2]];
        let out =
            combine_channels(&channels, &[], &ChannelSelection::Weighted(vec![0.0])).unwrap();
        assert_eq!(out, vec![0.0, 0.0]);
    }

    #[test]
    fn short_channels_contribute_zero() {
        let channels = vec![vec![1.0, 1.0, 1.0], vec![1.0]];
        let out = combine_channels(&channels, &[], &ChannelSelection::All).unwrap();
        assert_eq!(out, vec![1.0, 0.5, 0.5]);
    }
}

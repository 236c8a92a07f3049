//! Logged simulation data.

/// Receiver of logged samples.
pub trait DataSink {
    /// Append one sample row taken at `time`.
    fn insert_values_at_end(&mut self, values: &[f64], time: f64);
}

/// In-memory table of logged samples, one row per logged step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataContainer {
    signal_names: Vec<String>,
    times: Vec<f64>,
    rows: Vec<Vec<f64>>,
}

impl DataContainer {
    pub fn new(signal_names: Vec<String>) -> Self {
        Self::with_capacity(signal_names, 0)
    }

    /// Container with room for `rows` samples.
    pub fn with_capacity(signal_names: Vec<String>, rows: usize) -> Self {
        Self {
            signal_names,
            times: Vec::with_capacity(rows),
            rows: Vec::with_capacity(rows),
        }
    }

    pub fn signal_names(&self) -> &[String] {
        &self.signal_names
    }

    pub fn signal_count(&self) -> usize {
        self.signal_names.len()
    }

    /// Number of logged samples.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn last_row(&self) -> Option<&[f64]> {
        self.rows.last().map(Vec::as_slice)
    }

    pub fn last_time(&self) -> Option<f64> {
        self.times.last().copied()
    }

    /// Column of one signal.
    pub fn signal_data(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.signal_names.len() {
            return None;
        }
        Some(self.rows.iter().map(|row| row[index]).collect())
    }

    /// Column of a signal by name.
    pub fn signal(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.signal_names.iter().position(|n| n == name)?;
        self.signal_data(index)
    }
}

impl DataSink for DataContainer {
    fn insert_values_at_end(&mut self, values: &[f64], time: f64) {
        let mut row = values.to_vec();
        row.resize(self.signal_names.len(), 0.0);
        self.rows.push(row);
        self.times.push(time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns() {
        let mut data = DataContainer::new(vec!["a".into(), "I(R1)".into()]);
        data.insert_values_at_end(&[1.0, 0.1], 0.0);
        data.insert_values_at_end(&[2.0, 0.2], 1e-6);
        assert_eq!(data.len(), 2);
        assert_eq!(data.signal("a"), Some(vec![1.0, 2.0]));
        assert_eq!(data.signal("I(R1)"), Some(vec![0.1, 0.2]));
        assert_eq!(data.signal("b"), None);
        assert_eq!(data.last_time(), Some(1e-6));
        assert_eq!(data.row(0), Some(&[1.0, 0.1][..]));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let mut data = DataContainer::new(vec!["a".into(), "b".into()]);
        data.insert_values_at_end(&[1.0], 0.0);
        assert_eq!(data.last_row(), Some(&[1.0, 0.0][..]));
    }
}

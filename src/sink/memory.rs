use super::MetricsSink;
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    Increment {
        name: String,
        value: i64,
        tags: Vec<String>,
    },
    Histogram {
        name: String,
        value: u64,
        sample_rate: f64,
        tags: Vec<String>,
    },
}

impl Emission {
    pub fn name(&self) -> &str {
        match self {
            Emission::Increment { name, .. } | Emission::Histogram { name, .. } => name,
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            Emission::Increment { tags, .. } | Emission::Histogram { tags, .. } => tags,
        }
    }
}

/// Sink that keeps every emission in memory, in call order.
#[derive(Debug, Default)]
pub struct MemorySink {
    emissions: Mutex<Vec<Emission>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emissions(&self) -> Vec<Emission> {
        self.emissions.lock().clone()
    }

    /// Drain recorded emissions.
    pub fn take(&self) -> Vec<Emission> {
        std::mem::take(&mut *self.emissions.lock())
    }

    pub fn len(&self) -> usize {
        self.emissions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.emissions.lock().is_empty()
    }

    pub fn named(&self, name: &str) -> Vec<Emission> {
        self.emissions
            .lock()
            .iter()
            .filter(|emission| emission.name() == name)
            .cloned()
            .collect()
    }
}

impl MetricsSink for MemorySink {
    fn increment(&self, name: &str, value: i64, tags: &[String]) {
        self.emissions.lock().push(Emission::Increment {
            name: name.to_string(),
            value,
            tags: tags.to_vec(),
        });
    }

    fn histogram(&self, name: &str, value: u64, sample_rate: f64, tags: &[String]) {
        self.emissions.lock().push(Emission::Histogram {
            name: name.to_string(),
            value,
            sample_rate,
            tags: tags.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let sink = MemorySink::new();
        let tags = vec!["env:test".to_string()];

        sink.increment("a", 1, &tags);
        sink.histogram("b", 12, 1.0, &tags);

        let emissions = sink.emissions();
        assert_eq!(emissions.len(), 2);
        assert_eq!(emissions[0].name(), "a");
        assert_eq!(
            emissions[1],
            Emission::Histogram {
                name: "b".to_string(),
                value: 12,
                sample_rate: 1.0,
                tags: tags.clone(),
            }
        );
        assert_eq!(sink.named("b").len(), 1);
    }

    #[test]
    fn test_take_drains() {
        let sink = MemorySink::new();
        sink.increment("a", 1, &[]);

        assert_eq!(sink.take().len(), 1);
        assert!(sink.is_empty());
    }
}

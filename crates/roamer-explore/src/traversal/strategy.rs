use rand::Rng;
use rand_chacha::ChaCha8Rng;
use roamer_ir::{Event, Fingerprint, WidgetType};
use roamer_store::FrequencyTable;

/// A selectable event on the current screen together with its fingerprint.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub event: Event,
    pub fingerprint: Fingerprint,
}

/// Strategy decision: which candidate to execute next.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionDecision {
    pub index: usize,
    pub fingerprint: Fingerprint,
    pub frequency: u64,
}

impl SelectionDecision {
    fn pick(candidates: &[Candidate], frequencies: &FrequencyTable, index: usize) -> Self {
        let fingerprint = candidates[index].fingerprint.clone();
        let frequency = frequencies.get(&fingerprint);
        Self {
            index,
            fingerprint,
            frequency,
        }
    }
}

/// Picks one of the screen's candidates.
///
/// Callers never pass an empty candidate list; the sequence generator
/// substitutes a back-navigation event instead of calling `select`.
pub trait SelectionStrategy: Send + Sync {
    fn select(&mut self, candidates: &[Candidate], frequencies: &FrequencyTable) -> SelectionDecision;

    /// Name of this strategy (for tracing).
    fn name(&self) -> &str;
}

fn least_frequent_index(
    indices: impl Iterator<Item = usize>,
    candidates: &[Candidate],
    frequencies: &FrequencyTable,
) -> Option<usize> {
    // min_by_key keeps the first of equal elements, so ties go to input order.
    indices.min_by_key(|&i| frequencies.get(&candidates[i].fingerprint))
}

/// Least-frequently-executed candidate wins; ties go to the first one
/// offered on the screen. Deterministic given the frequencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastFrequentStrategy;

impl SelectionStrategy for LeastFrequentStrategy {
    fn select(&mut self, candidates: &[Candidate], frequencies: &FrequencyTable) -> SelectionDecision {
        let index = least_frequent_index(0..candidates.len(), candidates, frequencies).unwrap_or(0);
        SelectionDecision::pick(candidates, frequencies, index)
    }

    fn name(&self) -> &str {
        "least_frequent"
    }
}

/// Weighted random selection with weight `1 / (1 + frequency)`, seeded for
/// reproducibility. Rarely executed events are likelier but never certain.
pub struct FrequencyWeightedStrategy {
    rng: ChaCha8Rng,
}

impl FrequencyWeightedStrategy {
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self { rng }
    }
}

impl SelectionStrategy for FrequencyWeightedStrategy {
    fn select(&mut self, candidates: &[Candidate], frequencies: &FrequencyTable) -> SelectionDecision {
        let weights: Vec<f64> = candidates
            .iter()
            .map(|c| 1.0 / (1.0 + frequencies.get(&c.fingerprint) as f64))
            .collect();
        let total: f64 = weights.iter().sum();

        let mut roll: f64 = self.rng.gen::<f64>() * total;
        for (i, weight) in weights.iter().enumerate() {
            roll -= weight;
            if roll <= 0.0 {
                return SelectionDecision::pick(candidates, frequencies, i);
            }
        }

        // Rounding can leave a sliver of roll; fall back to last.
        SelectionDecision::pick(candidates, frequencies, candidates.len() - 1)
    }

    fn name(&self) -> &str {
        "frequency_weighted"
    }
}

/// Uniform random selection, ignoring history.
pub struct UniformRandomStrategy {
    rng: ChaCha8Rng,
}

impl UniformRandomStrategy {
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self { rng }
    }
}

impl SelectionStrategy for UniformRandomStrategy {
    fn select(&mut self, candidates: &[Candidate], frequencies: &FrequencyTable) -> SelectionDecision {
        let index = self.rng.gen_range(0..candidates.len());
        SelectionDecision::pick(candidates, frequencies, index)
    }

    fn name(&self) -> &str {
        "uniform_random"
    }
}

/// Prefers widget classes by position in `priority`; widgets not listed
/// rank after all listed ones. Within the best class, least frequent wins.
#[derive(Debug, Clone)]
pub struct WidgetPriorityStrategy {
    priority: Vec<WidgetType>,
}

impl WidgetPriorityStrategy {
    pub fn new(priority: Vec<WidgetType>) -> Self {
        Self { priority }
    }

    fn rank(&self, widget: WidgetType) -> usize {
        self.priority
            .iter()
            .position(|w| *w == widget)
            .unwrap_or(self.priority.len())
    }
}

impl Default for WidgetPriorityStrategy {
    fn default() -> Self {
        Self::new(vec![
            WidgetType::Button,
            WidgetType::ImageButton,
            WidgetType::CheckBox,
            WidgetType::RadioButton,
            WidgetType::Spinner,
            WidgetType::EditText,
            WidgetType::TextView,
        ])
    }
}

impl SelectionStrategy for WidgetPriorityStrategy {
    fn select(&mut self, candidates: &[Candidate], frequencies: &FrequencyTable) -> SelectionDecision {
        let best_rank = candidates
            .iter()
            .map(|c| self.rank(c.event.widget()))
            .min()
            .unwrap_or(0);
        let in_best_class =
            (0..candidates.len()).filter(|&i| self.rank(candidates[i].event.widget()) == best_rank);
        let index = least_frequent_index(in_best_class, candidates, frequencies).unwrap_or(0);
        SelectionDecision::pick(candidates, frequencies, index)
    }

    fn name(&self) -> &str {
        "widget_priority"
    }
}

//! Result list composition.

use std::fmt;

use serde::Serialize;

use crate::detect::{DetectedObject, DetectionResult};

/// Order detections by descending confidence.
///
/// The sort is stable: equal confidences keep the detector's order.
pub fn order_by_confidence_descending(objects: &[DetectedObject]) -> Vec<DetectedObject> {
    let mut ordered = objects.to_vec();
    ordered.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    ordered
}

/// Header figures for a finished detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub object_count: usize,
    pub processing_time_ms: u64,
}

impl ResultSummary {
    pub fn of(result: &DetectionResult) -> Self {
        Self {
            object_count: result.objects.len(),
            processing_time_ms: result.processing_time_ms,
        }
    }

    pub fn objects_line(&self) -> String {
        match self.object_count {
            1 => "1 object detected".to_string(),
            n => format!("{n} objects detected"),
        }
    }

    pub fn processing_line(&self) -> String {
        format!("Processing time: {} ms", self.processing_time_ms)
    }
}

/// Live status line.
impl fmt::Display for ResultSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Detected {} objects ({} ms)",
            self.object_count, self.processing_time_ms
        )
    }
}

/// Ordered list plus its header, ready for display.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultList {
    pub summary: ResultSummary,
    pub objects: Vec<DetectedObject>,
}

impl ResultList {
    pub fn compose(result: &DetectionResult) -> Self {
        Self {
            summary: ResultSummary::of(result),
            objects: order_by_confidence_descending(&result.objects),
        }
    }

    /// True when the "no objects" state should be shown.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn object(label: &str, confidence: f32) -> DetectedObject {
        DetectedObject::new(label, confidence, BoundingBox::default())
    }

    fn labels(objects: &[DetectedObject]) -> Vec<&str> {
        objects.iter().map(|o| o.label.as_str()).collect()
    }

    #[test]
    fn orders_descending_and_keeps_ties_stable() {
        let input = vec![object("A", 0.3), object("B", 0.9), object("C", 0.9)];
        let ordered = order_by_confidence_descending(&input);
        assert_eq!(labels(&ordered), vec!["B", "C", "A"]);
        // input untouched
        assert_eq!(labels(&input), vec!["A", "B", "C"]);
    }

    #[test]
    fn long_runs_of_ties_keep_input_order() {
        let input: Vec<DetectedObject> = (0..20)
            .map(|i| object(&format!("o{i}"), if i % 2 == 0 { 0.5 } else { 0.7 }))
            .collect();
        let ordered = order_by_confidence_descending(&input);
        let expected: Vec<String> = (0..20)
            .filter(|i| i % 2 == 1)
            .chain((0..20).filter(|i| i % 2 == 0))
            .map(|i| format!("o{i}"))
            .collect();
        let got: Vec<String> = ordered.into_iter().map(|o| o.label).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn empty_input_gives_empty_list() {
        assert!(order_by_confidence_descending(&[]).is_empty());
        let list = ResultList::compose(&DetectionResult::success(Vec::new(), 8));
        assert!(list.is_empty());
        assert_eq!(list.summary.objects_line(), "0 objects detected");
    }

    #[test]
    fn summary_lines() {
        let result = DetectionResult::success(vec![object("A", 0.3), object("B", 0.9)], 57);
        let list = ResultList::compose(&result);
        assert_eq!(labels(&list.objects), vec!["B", "A"]);
        assert_eq!(list.summary.objects_line(), "2 objects detected");
        assert_eq!(list.summary.processing_line(), "Processing time: 57 ms");
        assert_eq!(list.summary.to_string(), "Detected 2 objects (57 ms)");
    }
}

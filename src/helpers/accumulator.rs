use crate::processor::{AggregateOp, AggregateResult, ProcessorError};

/// Running (sum, count, min, max) over an integer column.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IntAccumulator {
    sum: i128,
    count: usize,
    min: i64,
    max: i64,
}

impl IntAccumulator {
    pub(crate) fn new() -> Self {
        IntAccumulator {
            sum: 0,
            count: 0,
            min: i64::MAX,
            max: i64::MIN,
        }
    }

    pub(crate) fn push(&mut self, v: i64) {
        self.sum += v as i128;
        self.count += 1;
        if v < self.min {
            self.min = v;
        }
        if v > self.max {
            self.max = v;
        }
    }

    pub(crate) fn finish(
        self,
        op: AggregateOp,
        column: &str,
    ) -> Result<Option<AggregateResult>, ProcessorError> {
        if self.count == 0 && op != AggregateOp::Count {
            return Ok(None);
        }

        let result = match op {
            AggregateOp::Count => AggregateResult::Int(self.count as i64),
            AggregateOp::Sum => AggregateResult::Int(
                i64::try_from(self.sum).map_err(|_| ProcessorError::Overflow(column.to_string()))?,
            ),
            AggregateOp::Mean => AggregateResult::Float(self.sum as f64 / self.count as f64),
            AggregateOp::Min => AggregateResult::Int(self.min),
            AggregateOp::Max => AggregateResult::Int(self.max),
        };
        Ok(Some(result))
    }
}

/// Running (sum, count, min, max) over a float column.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FloatAccumulator {
    sum: f64,
    count: usize,
    min: f64,
    max: f64,
}

impl FloatAccumulator {
    pub(crate) fn new() -> Self {
        FloatAccumulator {
            sum: 0.0,
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub(crate) fn push(&mut self, v: f64) {
        self.sum += v;
        self.count += 1;
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }

    pub(crate) fn finish(self, op: AggregateOp) -> Option<AggregateResult> {
        if self.count == 0 && op != AggregateOp::Count {
            return None;
        }

        Some(match op {
            AggregateOp::Count => AggregateResult::Int(self.count as i64),
            AggregateOp::Sum => AggregateResult::Float(self.sum),
            AggregateOp::Mean => AggregateResult::Float(self.sum / self.count as f64),
            AggregateOp::Min => AggregateResult::Float(self.min),
            AggregateOp::Max => AggregateResult::Float(self.max),
        })
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use floorwatch::domain::GroupId;
use floorwatch::error::SourceError;
use floorwatch::port::PriceSource;
use rust_decimal::Decimal;

/// Price source returning a fixed floor per group.
pub struct FixedPriceSource {
    prices: HashMap<String, Decimal>,
}

impl FixedPriceSource {
    pub fn new(pairs: &[(&str, Decimal)]) -> Self {
        Self {
            prices: pairs.iter().map(|(g, p)| (g.to_string(), *p)).collect(),
        }
    }
}

#[async_trait]
impl PriceSource for FixedPriceSource {
    async fn floor_price(&self, group_id: &GroupId) -> Result<Option<Decimal>, SourceError> {
        Ok(self.prices.get(group_id.as_str()).copied())
    }
}

use crate::error::SimulationError;
use crate::shop::product::Product;

/// Value travelling over a coupling.
///
/// Ports carry exactly what they mean: one product, a whole finished batch,
/// or a spare-capacity notification.
#[derive(Debug, Clone, PartialEq)]
pub enum PortValue {
    Product(Product),
    Batch(Vec<Product>),
    Capacity(u32),
}

impl PortValue {
    pub fn kind(&self) -> &'static str {
        match self {
            PortValue::Product(_) => "product",
            PortValue::Batch(_) => "batch",
            PortValue::Capacity(_) => "capacity",
        }
    }

    /// Flatten product-carrying values; `None` for a capacity notification
    pub fn into_products(self) -> Option<Vec<Product>> {
        match self {
            PortValue::Product(product) => Some(vec![product]),
            PortValue::Batch(products) => Some(products),
            PortValue::Capacity(_) => None,
        }
    }
}

/// Port-tagged values, in the order they were produced.
///
/// Used both for the output of a model and for the input bag delivered to a
/// model in one round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortBag {
    entries: Vec<(String, PortValue)>,
}

impl PortBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bag holding a single value
    pub fn single(port: &str, value: PortValue) -> Self {
        let mut bag = Self::new();
        bag.push(port, value);
        bag
    }

    pub fn push(&mut self, port: &str, value: PortValue) {
        self.entries.push((port.to_string(), value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PortValue)> {
        self.entries.iter().map(|(port, value)| (port.as_str(), value))
    }

    /// Values received on one port
    pub fn on<'a>(&'a self, port: &'a str) -> impl Iterator<Item = &'a PortValue> + 'a {
        self.entries
            .iter()
            .filter(move |(name, _)| name == port)
            .map(|(_, value)| value)
    }

    pub fn ports(&self) -> Vec<&str> {
        let mut ports: Vec<&str> = Vec::new();
        for (port, _) in &self.entries {
            if !ports.contains(&port.as_str()) {
                ports.push(port);
            }
        }
        ports
    }

    /// Unwrap a capacity notification, failing on any other value kind
    pub fn expect_capacity(model: &str, port: &str, value: &PortValue) -> Result<u32, SimulationError> {
        match value {
            PortValue::Capacity(capacity) => Ok(*capacity),
            _ => Err(SimulationError::UnexpectedValue {
                model: model.to_string(),
                port: port.to_string(),
                expected: "capacity",
            }),
        }
    }

    /// Unwrap products, failing on a capacity notification
    pub fn expect_products(model: &str, port: &str, value: PortValue) -> Result<Vec<Product>, SimulationError> {
        value.into_products().ok_or_else(|| SimulationError::UnexpectedValue {
            model: model.to_string(),
            port: port.to_string(),
            expected: "product or batch",
        })
    }
}

impl IntoIterator for PortBag {
    type Item = (String, PortValue);
    type IntoIter = std::vec::IntoIter<(String, PortValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

//! Builder 模式实现
//!
//! 提供链式构造 `Epos` 实例的便捷方式。

use crate::config::Configuration;
use crate::epos::Epos;
use crate::error::DriverError;
use epos_bus::EthercatBus;
use std::path::PathBuf;
use std::sync::Arc;

/// Epos Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use epos_bus::EthercatBus;
/// use epos_driver::{Configuration, EposBuilder, ModeOfOperation};
///
/// # fn example(bus: Arc<dyn EthercatBus>) -> Result<(), epos_driver::DriverError> {
/// let epos = EposBuilder::new("joint1", 1, bus)
///     .configuration(Configuration {
///         mode_of_operation: ModeOfOperation::CyclicSynchronousPosition,
///         ..Default::default()
///     })
///     .build()?;
/// epos.startup()?;
/// # Ok(())
/// # }
/// ```
pub struct EposBuilder {
    name: String,
    address: u16,
    bus: Arc<dyn EthercatBus>,
    configuration: Option<Configuration>,
    config_file: Option<PathBuf>,
}

impl EposBuilder {
    /// `address` 为从站在总线上的地址
    pub fn new(name: impl Into<String>, address: u16, bus: Arc<dyn EthercatBus>) -> Self {
        Self {
            name: name.into(),
            address,
            bus,
            configuration: None,
            config_file: None,
        }
    }

    /// 直接给出配置（优先于配置文件）
    pub fn configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = Some(configuration);
        self
    }

    /// 从 TOML 文件加载配置
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Epos, DriverError> {
        let configuration = match (self.configuration, self.config_file) {
            (Some(configuration), _) => configuration,
            (None, Some(path)) => Configuration::from_file(path)?,
            (None, None) => Configuration::default(),
        };
        Epos::new(self.name, self.address, self.bus, configuration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epos_bus::MockBus;
    use epos_protocol::{ModeOfOperation, RxPdoType};

    #[test]
    fn test_build_with_defaults() {
        let epos = EposBuilder::new("joint1", 3, Arc::new(MockBus::new(3)))
            .build()
            .unwrap();
        assert_eq!(epos.name(), "joint1");
        assert_eq!(epos.address(), 3);
        assert_eq!(epos.configuration(), &Configuration::default());
    }

    #[test]
    fn test_build_from_file() {
        let path = std::env::temp_dir().join(format!("epos-builder-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "mode_of_operation = \"CyclicSynchronousTorque\"\nrx_pdo_type = \"Cst\"\n",
        )
        .unwrap();
        let epos = EposBuilder::new("joint2", 1, Arc::new(MockBus::new(1)))
            .config_file(&path)
            .build()
            .unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(
            epos.configuration().mode_of_operation,
            ModeOfOperation::CyclicSynchronousTorque
        );
        assert_eq!(epos.configuration().rx_pdo_type, RxPdoType::Cst);
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        let result = EposBuilder::new("joint3", 1, Arc::new(MockBus::new(1)))
            .config_file("/nonexistent/epos.toml")
            .build();
        assert!(matches!(result, Err(DriverError::Config(_))));
    }
}

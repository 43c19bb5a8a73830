//! Names of the tables shared by the transform and the validator

pub const RAW_ENERGY: &str = "factenergydaily";
pub const RAW_HEATING: &str = "factheatingdaily";
pub const RAW_CO2: &str = "factco2daily";

pub const DIM_DATE: &str = "dimdate";
pub const DIM_PLANT: &str = "dimplant";
pub const CURATED_ENERGY: &str = "factenergydaily";
pub const CURATED_HEATING: &str = "factheatingdaily";
pub const CURATED_CO2: &str = "factco2daily";
pub const ENERGY_KPI: &str = "fact_energy_kpi_daily";
pub const HEATING_KPI: &str = "fact_heating_kpi_daily";
pub const HEATING_EMISSIONS: &str = "fact_heating_emissions_daily";

/// Every table that must exist and be non-empty after a run
pub const CURATED_TABLES: [&str; 8] = [
    DIM_DATE,
    DIM_PLANT,
    CURATED_ENERGY,
    CURATED_HEATING,
    CURATED_CO2,
    ENERGY_KPI,
    HEATING_KPI,
    HEATING_EMISSIONS,
];

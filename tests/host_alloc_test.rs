//! Host allocation metering on the CPU backend
//!
//! This binary installs the counting allocator, so it holds a single test:
//! concurrent tests would add their own allocations to the tally.

use pcbench::backend::{CpuBackend, DeviceContext};
use pcbench::circuit::HcltParams;
use pcbench::config::BenchConfig;
use pcbench::dataset::{synthetic, PreparedData};
use pcbench::experiment::{
    ExperimentDriver, ModelFamily, ModelParams, Sweep, SweepAxis, SweepPlan,
};
use pcbench::trial::{CountingAllocator, FixedProbe};

#[global_allocator]
static ALLOCATOR: CountingAllocator = CountingAllocator::new();

fn run(config: BenchConfig, data: &PreparedData, metered: bool) -> Vec<(u64, u64)> {
    let backend = CpuBackend::new(DeviceContext::new(0), config.threads).unwrap();
    let plan = SweepPlan::new(
        ModelParams::Hclt(HcltParams::default()),
        vec![Sweep::new(SweepAxis::Latents, vec![2, 16])],
    )
    .unwrap();

    let mut driver = ExperimentDriver::new(&backend, FixedProbe::new(0), config);
    if metered {
        driver = driver.with_allocation_meter(&ALLOCATOR);
    }
    let report = driver.run_plan(&plan, data).unwrap();
    report
        .records("latents")
        .unwrap()
        .iter()
        .map(|r| {
            let results = r.results().unwrap();
            let map = results.map.unwrap();
            (results.evi.cpu_alloc_memory, map.cpu_alloc_memory)
        })
        .collect()
}

#[test]
fn test_host_bytes_follow_model_size() {
    let config = BenchConfig::builder()
        .budget_secs(0.0)
        .batch_size(8)
        .threads(1)
        .map_family(ModelFamily::Hclt)
        .build()
        .unwrap();
    let data = PreparedData::prepare(synthetic(32, 16, 7), config.prepare_options()).unwrap();
    let output_evi = 32 * 4;
    let output_map = 32 * 16;

    let measured = run(config.clone(), &data, true);
    let (small_evi, small_map) = measured[0];
    let (large_evi, large_map) = measured[1];
    assert!(small_evi > output_evi, "evi {small_evi} <= {output_evi}");
    assert!(small_map > output_map, "map {small_map} <= {output_map}");
    assert!(large_evi > small_evi, "evi {large_evi} <= {small_evi}");
    assert!(large_map > small_map, "map {large_map} <= {small_map}");

    // without a meter only the output buffers are accounted
    let accounted = run(config, &data, false);
    assert_eq!(accounted, vec![(output_evi, output_map); 2]);
}

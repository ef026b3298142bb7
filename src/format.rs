use crate::enums::{ Category, RelativeRisk };

/// `$1.23M` style TVL, two decimals.
pub fn format_tvl(tvl: f64) -> String {
    const TRILLION: f64 = 1_000_000_000_000.0;
    const BILLION: f64 = 1_000_000_000.0;
    const MILLION: f64 = 1_000_000.0;
    const THOUSAND: f64 = 1_000.0;

    if tvl >= TRILLION {
        format!("${:.2}T", tvl / TRILLION)
    } else if tvl >= BILLION {
        format!("${:.2}B", tvl / BILLION)
    } else if tvl >= MILLION {
        format!("${:.2}M", tvl / MILLION)
    } else if tvl >= THOUSAND {
        format!("${:.2}K", tvl / THOUSAND)
    } else {
        format!("${:.2}", tvl)
    }
}

fn network_factor(network: &str) -> f64 {
    match network.to_lowercase().as_str() {
        "ethereum" => 1.0,
        "optimism" | "arbitrum" | "base" => 0.95,
        _ => 0.9,
    }
}

fn risk_factor(risk: RelativeRisk) -> f64 {
    match risk {
        RelativeRisk::Low => 1.0,
        RelativeRisk::Medium => 0.9,
        RelativeRisk::High => 0.8,
    }
}

fn tvl_factor(tvl: f64) -> f64 {
    if tvl >= 100_000_000.0 {
        1.0
    } else if tvl >= 10_000_000.0 {
        0.95
    } else if tvl >= 1_000_000.0 {
        0.9
    } else {
        0.85
    }
}

fn category_factor(category: Category) -> f64 {
    match category {
        Category::Stablecoin => 1.0,
        Category::VolatileAsset => 0.95,
        Category::AdvancedStrategies => 0.9,
    }
}

/// APY discounted for network, risk, depth and category. Never exceeds the
/// raw APY; the benchmark bonus can only cancel out discounts.
pub fn risk_adjusted_apy(
    estimated_apy: f64,
    network: &str,
    risk: RelativeRisk,
    tvl: f64,
    is_benchmark: bool,
    category: Category
) -> f64 {
    let mut factor =
        network_factor(network) * risk_factor(risk) * tvl_factor(tvl) * category_factor(category);
    if is_benchmark {
        factor *= 1.1;
    }

    let adjusted = estimated_apy * factor;
    if adjusted > estimated_apy {
        estimated_apy
    } else {
        (adjusted * 100.0).round() / 100.0
    }
}

//! Tally report rendering.

use crate::config::Config;
use crate::store::VotingDataset;

/// Render the admin tally report: candidates ranked by count descending,
/// ties broken by roster order, plus the distinct voter count.
pub fn render(config: &Config, dataset: &VotingDataset) -> String {
    let mut ranked: Vec<(usize, &str, &str, u64)> = config
        .candidates
        .iter()
        .enumerate()
        .map(|(index, c)| (index, c.name.as_str(), c.group.label(), dataset.count(&c.id)))
        .collect();
    ranked.sort_by(|x, y| y.3.cmp(&x.3).then(x.0.cmp(&y.0)));

    let mut out = String::from("Current tally:\n");
    for (place, (_, name, group, count)) in ranked.iter().enumerate() {
        let unit = if *count == 1 { "vote" } else { "votes" };
        out.push_str(&format!(
            "{}. {} (group {}): {} {}\n",
            place + 1,
            name,
            group,
            count,
            unit
        ));
    }
    out.push_str(&format!("Distinct voters: {}", dataset.distinct_voters()));
    out
}

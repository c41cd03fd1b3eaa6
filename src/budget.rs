use crate::config::BudgetConfig;
use crate::types::{truncate_chars, NewsItem};
use tracing::{debug, info};

/// Serializes one item the way the digest prompt frames it. The budgeter
/// accounts for exactly this framing, so the two must not drift apart.
pub fn frame_item(item: &NewsItem) -> String {
    format!("[Source: {}]\n{}\n---\n", item.source, item.content)
}

fn framing_overhead(item: &NewsItem) -> usize {
    // frame_item with the content removed
    "[Source: ]\n\n---\n".chars().count() + item.source.chars().count()
}

/// Shrinks a batch of news items until the framed serialization fits a
/// character budget. Every source keeps a proportional slice; the policy
/// does not prioritize by recency or source diversity.
pub struct ContentBudgeter {
    per_article_chars: usize,
    floor_chars: usize,
}

impl ContentBudgeter {
    pub fn new(config: &BudgetConfig) -> Self {
        Self {
            per_article_chars: config.per_article_chars,
            floor_chars: config.floor_chars,
        }
    }

    /// Returns items whose framed total is within `max_chars`. Non-empty
    /// input always yields at least one item, so the pipeline never sends
    /// an empty prompt; when even the first item's framing overhead
    /// exceeds the budget, that item survives with empty content. In
    /// every other case the framed total stays within `max_chars`: the
    /// per-item floor applies only to the prefix of items it fits, and
    /// trailing items are dropped rather than let the floor overshoot.
    pub fn truncate(&self, items: &[NewsItem], max_chars: usize) -> Vec<NewsItem> {
        let capped: Vec<NewsItem> = items
            .iter()
            .map(|item| item.with_content(truncate_chars(&item.content, self.per_article_chars)))
            .collect();
        if capped.is_empty() {
            return capped;
        }

        let total: usize = capped.iter().map(|i| frame_item(i).chars().count()).sum();
        if total <= max_chars {
            debug!(
                "Batch of {} items fits budget ({} <= {})",
                capped.len(),
                total,
                max_chars
            );
            return capped;
        }

        // Longest prefix whose framing plus per-item minimum content fits.
        let minimum = |item: &NewsItem| item.content.chars().count().min(self.floor_chars);
        let mut kept = 0;
        let mut used = 0;
        for item in &capped {
            let cost = framing_overhead(item) + minimum(item);
            if used + cost > max_chars {
                break;
            }
            used += cost;
            kept += 1;
        }

        if kept == 0 {
            let first = &capped[0];
            let keep = max_chars.saturating_sub(framing_overhead(first));
            info!(
                "Budget {} cannot cover one floored item, degrading to first item",
                max_chars
            );
            return vec![first.with_content(truncate_chars(&first.content, keep))];
        }
        if kept < capped.len() {
            info!(
                "Budget {} covers only {} of {} items at the {}-char floor, dropping the rest",
                max_chars,
                kept,
                capped.len(),
                self.floor_chars
            );
        }

        // Split the leftover budget across the kept items in proportion to
        // how much content each has beyond its minimum.
        let prefix = &capped[..kept];
        let leftover = max_chars - used;
        let capacity: usize = prefix
            .iter()
            .map(|item| item.content.chars().count() - minimum(item))
            .sum();

        info!(
            "Shrinking {} items to fit {} chars ({} beyond the floor)",
            kept, max_chars, leftover
        );
        prefix
            .iter()
            .map(|item| {
                let len = item.content.chars().count();
                let min = minimum(item);
                let extra = if capacity == 0 {
                    0
                } else {
                    leftover * (len - min) / capacity
                };
                item.with_content(truncate_chars(&item.content, min + extra))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(source: &str, content_len: usize) -> NewsItem {
        NewsItem {
            source: source.to_string(),
            title: "title".to_string(),
            content: "x".repeat(content_len),
            link: "https://example.com/post".to_string(),
        }
    }

    fn budgeter() -> ContentBudgeter {
        ContentBudgeter::new(&BudgetConfig::default())
    }

    fn framed_total(items: &[NewsItem]) -> usize {
        items.iter().map(|i| frame_item(i).chars().count()).sum()
    }

    #[test]
    fn fits_unchanged_when_under_budget() {
        let items = vec![item("a", 100), item("b", 100)];
        let out = budgeter().truncate(&items, 10_000);
        assert_eq!(out, items);
    }

    #[test]
    fn framed_total_never_exceeds_budget() {
        let items = vec![item("alpha", 900), item("beta", 400), item("gamma", 700)];
        for max_chars in [400, 700, 1_000, 1_500] {
            let out = budgeter().truncate(&items, max_chars);
            assert!(!out.is_empty());
            assert!(
                framed_total(&out) <= max_chars,
                "budget {} exceeded: {}",
                max_chars,
                framed_total(&out)
            );
        }
    }

    #[test]
    fn degenerate_budget_returns_exactly_first_item() {
        let items = vec![item("alpha", 500), item("beta", 500), item("gamma", 500)];
        // Overhead alone for three items is well above 20 chars.
        let out = budgeter().truncate(&items, 20);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, "alpha");
        assert!(out[0].content.chars().count() <= 20);
    }

    #[test]
    fn proportional_shrink_is_uniform() {
        let items = vec![item("a", 1000), item("b", 1000), item("c", 1000)];
        let total_overhead: usize = items
            .iter()
            .map(|i| frame_item(i).chars().count() - i.content.chars().count())
            .sum();
        let out = budgeter().truncate(&items, total_overhead + 1800);
        assert_eq!(out.len(), 3);
        for truncated in &out {
            let len = truncated.content.chars().count();
            assert!((599..=601).contains(&len), "expected ~600, got {}", len);
        }
    }

    #[test]
    fn shrink_respects_per_item_floor() {
        let items = vec![item("a", 1000), item("b", 1000)];
        let total_overhead: usize = items
            .iter()
            .map(|i| frame_item(i).chars().count() - i.content.chars().count())
            .sum();
        // Proportional shrink alone would leave ~50 chars each anyway;
        // with zero leftover beyond the minimums, both sit at the floor.
        let out = budgeter().truncate(&items, total_overhead + 100);
        assert_eq!(out.len(), 2);
        for truncated in &out {
            assert_eq!(truncated.content.chars().count(), 50);
        }
    }

    #[test]
    fn floor_never_overrides_the_budget_bound() {
        // At 40 content chars for four items the 50-char floor fits none
        // of them fully; trailing items are dropped, not overshot.
        let items = vec![item("a", 200), item("b", 200), item("c", 200), item("d", 200)];
        let total_overhead: usize = items
            .iter()
            .map(|i| frame_item(i).chars().count() - i.content.chars().count())
            .sum();
        let max_chars = total_overhead + 40;
        let out = budgeter().truncate(&items, max_chars);
        assert!(!out.is_empty());
        assert!(
            framed_total(&out) <= max_chars,
            "framed total {} exceeds budget {}",
            framed_total(&out),
            max_chars
        );
    }

    #[test]
    fn tiny_budgets_stay_within_bound_once_one_item_frames() {
        let items = vec![item("a", 200), item("b", 200), item("c", 200), item("d", 200)];
        let first_overhead = frame_item(&item("a", 0)).chars().count();
        for max_chars in first_overhead..400 {
            let out = budgeter().truncate(&items, max_chars);
            assert!(!out.is_empty(), "budget {} emptied the batch", max_chars);
            assert!(
                framed_total(&out) <= max_chars,
                "budget {} exceeded: {}",
                max_chars,
                framed_total(&out)
            );
        }
    }

    #[test]
    fn per_article_cap_applies_before_budgeting() {
        let items = vec![item("a", 5_000)];
        let out = budgeter().truncate(&items, 100_000);
        assert_eq!(
            out[0].content.chars().count(),
            BudgetConfig::default().per_article_chars
        );
    }

    #[test]
    fn empty_input_stays_empty() {
        let out = budgeter().truncate(&[], 1_000);
        assert!(out.is_empty());
    }
}

use rust_decimal::Decimal;

/// The `n` items with the highest `key`, highest first. Ties keep the order
/// in which `items` yielded them.
pub fn top_n_by<T, K, F>(items: impl IntoIterator<Item = T>, n: usize, key: F) -> Vec<T>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut ranked: Vec<T> = items.into_iter().collect();
    // sort_by is stable
    ranked.sort_by(|a, b| key(b).cmp(&key(a)));
    ranked.truncate(n);
    ranked
}

/// `sum / count`, or zero when there is nothing to average.
pub fn average(sum: Decimal, count: usize) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    sum / Decimal::from(count)
}

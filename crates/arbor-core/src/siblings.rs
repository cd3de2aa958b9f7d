//! Ordering of the host children of one widget.
//!
//! Runs after the destroys of a sibling list have been emitted, so the host's
//! child list at that point is the old list minus the destroyed widgets.

use crate::collections::map::{HashMap, HashSet};
use crate::command::{Command, WidgetId};
use crate::error::RenderError;

/// Commands moving `parent`'s children from `old` to `new`.
///
/// Children in `destroyed` were already removed by their destroy commands.
/// Survivors on the longest increasing run stay in place, the remaining
/// survivors are detached and reinserted, and new widgets are inserted.
pub(crate) fn diff(
    parent: WidgetId,
    old: &[WidgetId],
    new: &[WidgetId],
    destroyed: &HashSet<WidgetId>,
) -> Result<Vec<Command>, RenderError> {
    let wanted: HashSet<WidgetId> = new.iter().copied().collect();
    let current: Vec<WidgetId> = old
        .iter()
        .copied()
        .filter(|widget| !destroyed.contains(widget))
        .collect();
    if let Some(&widget) = current.iter().find(|&&widget| !wanted.contains(&widget)) {
        return Err(RenderError::UnresolvedChild { parent, widget });
    }

    let head = current
        .iter()
        .zip(new)
        .take_while(|(a, b)| a == b)
        .count();
    let tail = current[head..]
        .iter()
        .rev()
        .zip(new[head..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let old_middle = &current[head..current.len() - tail];
    let new_middle = &new[head..new.len() - tail];

    let mut commands = Vec::new();
    if old_middle.is_empty() && new_middle.is_empty() {
        return Ok(commands);
    }

    let old_index: HashMap<WidgetId, usize> = old_middle
        .iter()
        .enumerate()
        .map(|(index, &widget)| (widget, index))
        .collect();
    // Survivors in new order, as positions in the old list.
    let survivors: Vec<(usize, usize)> = new_middle
        .iter()
        .enumerate()
        .filter_map(|(new_pos, widget)| old_index.get(widget).map(|&old_pos| (new_pos, old_pos)))
        .collect();
    let sequence: Vec<usize> = survivors.iter().map(|&(_, old_pos)| old_pos).collect();
    let stable: HashSet<WidgetId> = longest_increasing_subsequence(&sequence)
        .into_iter()
        .map(|at| new_middle[survivors[at].0])
        .collect();

    for &widget in old_middle {
        if !stable.contains(&widget) {
            commands.push(Command::detach(parent, widget));
        }
    }
    for (offset, &widget) in new_middle.iter().enumerate() {
        if !stable.contains(&widget) {
            commands.push(Command::insert(parent, head + offset, widget));
        }
    }
    Ok(commands)
}

/// Positions in `sequence` forming one longest strictly increasing run. Ties
/// resolve to the run ending in the smallest values.
pub(crate) fn longest_increasing_subsequence(sequence: &[usize]) -> Vec<usize> {
    // tails[k]: position of the smallest tail of a run of length k + 1.
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = vec![None; sequence.len()];
    for (position, &value) in sequence.iter().enumerate() {
        let slot = tails.partition_point(|&at| sequence[at] < value);
        if slot > 0 {
            previous[position] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(position);
        } else {
            tails[slot] = position;
        }
    }
    let mut run = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(position) = cursor {
        run.push(position);
        cursor = previous[position];
    }
    run.reverse();
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;

    fn ids(raw: &[u64]) -> Vec<WidgetId> {
        raw.iter().copied().map(WidgetId::from_raw).collect()
    }

    fn run(old: &[u64], new: &[u64], destroyed: &[u64]) -> Vec<(Option<WidgetId>, CommandKind)> {
        let destroyed: HashSet<WidgetId> = ids(destroyed).into_iter().collect();
        diff(WidgetId::from_raw(0), &ids(old), &ids(new), &destroyed)
            .unwrap()
            .iter()
            .map(|command| (command.target(), command.kind().clone()))
            .collect()
    }

    fn insert(child: u64, index: usize) -> (Option<WidgetId>, CommandKind) {
        (
            Some(WidgetId::from_raw(child)),
            CommandKind::Insert {
                parent: WidgetId::from_raw(0),
                index,
            },
        )
    }

    fn detach(child: u64) -> (Option<WidgetId>, CommandKind) {
        (
            Some(WidgetId::from_raw(child)),
            CommandKind::Detach {
                parent: WidgetId::from_raw(0),
            },
        )
    }

    #[test]
    fn lis_picks_a_longest_run() {
        assert_eq!(longest_increasing_subsequence(&[]), Vec::<usize>::new());
        assert_eq!(longest_increasing_subsequence(&[2, 0, 1, 3]), vec![1, 2, 3]);
        assert_eq!(longest_increasing_subsequence(&[3, 2, 1]), vec![2]);
    }

    #[test]
    fn unchanged_list_emits_nothing() {
        assert!(run(&[1, 2, 3], &[1, 2, 3], &[]).is_empty());
    }

    #[test]
    fn append_and_prepend_only_insert() {
        assert_eq!(run(&[1, 2], &[1, 2, 3], &[]), vec![insert(3, 2)]);
        assert_eq!(run(&[1, 2], &[3, 1, 2], &[]), vec![insert(3, 0)]);
    }

    #[test]
    fn swap_moves_one_child() {
        assert_eq!(run(&[1, 2], &[2, 1], &[]), vec![detach(2), insert(2, 0)]);
    }

    #[test]
    fn replaced_child_is_inserted_where_the_old_one_was() {
        assert_eq!(run(&[1, 2, 3], &[1, 4, 3], &[2]), vec![insert(4, 1)]);
    }

    #[test]
    fn reverse_keeps_one_child_in_place() {
        let commands = run(&[1, 2, 3], &[3, 2, 1], &[]);
        assert_eq!(
            commands,
            vec![detach(2), detach(3), insert(3, 0), insert(2, 1)]
        );
    }

    #[test]
    fn leftover_child_is_reported() {
        let destroyed = HashSet::default();
        let err = diff(WidgetId::from_raw(0), &ids(&[1, 2]), &ids(&[1]), &destroyed).unwrap_err();
        assert!(matches!(
            err,
            RenderError::UnresolvedChild { widget, .. } if widget == WidgetId::from_raw(2)
        ));
    }

    #[test]
    fn destroyed_children_are_not_leftovers() {
        assert!(run(&[1, 2, 3], &[1, 3], &[2]).is_empty());
        assert_eq!(run(&[1, 2, 3], &[3, 1], &[2]), vec![detach(3), insert(3, 0)]);
    }
}

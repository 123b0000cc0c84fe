//! Undo and clear-all for surface annotations.
//!
//! Undo removes the most recently inserted annotation only. Strokes and text
//! notes carry an [`InsertionOrder`] stamped from a monotonic counter; the
//! background and other system entities never do, so they are immune.
//!
//! - **Ctrl+Z** or the toolbar Undo button: remove the newest annotation
//! - Clear removes every annotation, leaving only the background

use bevy::prelude::*;

/// Marker for undoable foreground objects (strokes and text notes)
#[derive(Component)]
pub struct AnnotationMarker;

/// Monotonic insertion stamp, higher means newer
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct InsertionOrder(pub u64);

/// Counter handing out insertion stamps
#[derive(Resource, Default)]
pub struct AnnotationSequence(u64);

impl AnnotationSequence {
    pub fn next(&mut self) -> InsertionOrder {
        self.0 += 1;
        InsertionOrder(self.0)
    }
}

/// Message to remove the newest annotation
#[derive(Message)]
pub struct UndoRequest;

/// Message to remove every annotation from the surface
#[derive(Message)]
pub struct ClearAllRequest;

/// Pick the entry with the highest insertion stamp
pub fn latest_insertion<T>(entries: impl IntoIterator<Item = (T, InsertionOrder)>) -> Option<T> {
    entries
        .into_iter()
        .max_by_key(|(_, order)| *order)
        .map(|(entity, _)| entity)
}

/// Ctrl+Z writes an undo request, same as the toolbar button
pub fn undo_shortcut(keyboard: Res<ButtonInput<KeyCode>>, mut requests: MessageWriter<UndoRequest>) {
    let ctrl = keyboard.pressed(KeyCode::ControlLeft) || keyboard.pressed(KeyCode::ControlRight);
    if ctrl && keyboard.just_pressed(KeyCode::KeyZ) {
        requests.write(UndoRequest);
    }
}

pub fn handle_undo(
    mut requests: MessageReader<UndoRequest>,
    mut commands: Commands,
    annotations: Query<(Entity, &InsertionOrder), With<AnnotationMarker>>,
) {
    for _ in requests.read() {
        let Some(newest) = latest_insertion(annotations.iter().map(|(e, o)| (e, *o))) else {
            debug!("Undo requested with no annotations on the surface");
            continue;
        };
        commands.entity(newest).despawn();
        debug!("Removed newest annotation");
    }
}

pub fn handle_clear_all(
    mut requests: MessageReader<ClearAllRequest>,
    mut commands: Commands,
    annotations: Query<Entity, With<AnnotationMarker>>,
) {
    for _ in requests.read() {
        let count = annotations.iter().count();
        for entity in annotations.iter() {
            commands.entity(entity).despawn();
        }
        info!("Cleared {} annotations", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let mut seq = AnnotationSequence::default();
        let a = seq.next();
        let b = seq.next();
        let c = seq.next();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_latest_insertion_picks_newest() {
        let entries = vec![
            ("stroke-a", InsertionOrder(3)),
            ("text-b", InsertionOrder(7)),
            ("stroke-c", InsertionOrder(5)),
        ];
        assert_eq!(latest_insertion(entries), Some("text-b"));
    }

    #[test]
    fn test_latest_insertion_empty() {
        assert_eq!(latest_insertion(Vec::<(u32, InsertionOrder)>::new()), None);
    }

    #[test]
    fn test_undo_until_empty_is_stable() {
        let mut entries = vec![(1u32, InsertionOrder(1)), (2u32, InsertionOrder(2))];

        // Draining removes newest-first and then keeps returning None
        let first = latest_insertion(entries.clone());
        assert_eq!(first, Some(2));
        entries.retain(|(e, _)| Some(*e) != first);

        let second = latest_insertion(entries.clone());
        assert_eq!(second, Some(1));
        entries.retain(|(e, _)| Some(*e) != second);

        assert_eq!(latest_insertion(entries.clone()), None);
        assert_eq!(latest_insertion(entries), None);
    }
}

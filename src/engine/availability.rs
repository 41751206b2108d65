use crate::model::*;

// ── Free-window computation ───────────────────────────────────────

/// Sub-windows of `window` not covered by any confirmed reservation.
/// Cancelled and completed reservations leave the vehicle free.
pub fn free_windows(vs: &VehicleState, window: &Span) -> Vec<Span> {
    let mut busy: Vec<Span> = vs
        .overlapping(window)
        .filter(|r| r.is_confirmed())
        .map(|r| Span::new(r.span.start.max(window.start), r.span.end.min(window.end)))
        .collect();
    if busy.is_empty() {
        return vec![*window];
    }
    busy.sort_by_key(|s| s.start);
    subtract_intervals(&[*window], &merge_overlapping(&busy))
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

/// `base` minus `to_remove`. Both sorted and disjoint.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut cursor = b.start;

        while ri < to_remove.len() && to_remove[ri].end <= cursor {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < b.end {
            let r = &to_remove[j];
            if r.start > cursor {
                result.push(Span::new(cursor, r.start));
            }
            cursor = cursor.max(r.end);
            j += 1;
        }

        if cursor < b.end {
            result.push(Span::new(cursor, b.end));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures;
    use ulid::Ulid;

    const H: Ms = 3_600_000;

    fn vehicle_with(bookings: &[(Ms, Ms, ReservationStatus)]) -> VehicleState {
        let v = fixtures::vehicle(5);
        let mut vs = VehicleState::new(v.clone());
        for &(start, end, status) in bookings {
            let mut r = fixtures::reservation(v.id, Ulid::new(), start, end);
            r.status = status;
            vs.insert_reservation(r);
        }
        vs
    }

    #[test]
    fn subtract_middle_punch() {
        let result = subtract_intervals(&[Span::new(100, 300)], &[Span::new(150, 200)]);
        assert_eq!(result, vec![Span::new(100, 150), Span::new(200, 300)]);
    }

    #[test]
    fn subtract_full_cover_leaves_nothing() {
        assert!(subtract_intervals(&[Span::new(100, 200)], &[Span::new(50, 250)]).is_empty());
    }

    #[test]
    fn subtract_touching_keeps_base() {
        let base = vec![Span::new(100, 200), Span::new(300, 400)];
        assert_eq!(subtract_intervals(&base, &[Span::new(200, 300)]), base);
    }

    #[test]
    fn merge_joins_adjacent_and_overlapping() {
        let merged = merge_overlapping(&[
            Span::new(100, 200),
            Span::new(200, 300),
            Span::new(250, 400),
            Span::new(500, 600),
        ]);
        assert_eq!(merged, vec![Span::new(100, 400), Span::new(500, 600)]);
    }

    #[test]
    fn free_windows_around_confirmed() {
        let vs = vehicle_with(&[
            (10 * H, 12 * H, ReservationStatus::Confirmed),
            (14 * H, 15 * H, ReservationStatus::Confirmed),
        ]);
        let free = free_windows(&vs, &Span::new(8 * H, 18 * H));
        assert_eq!(
            free,
            vec![
                Span::new(8 * H, 10 * H),
                Span::new(12 * H, 14 * H),
                Span::new(15 * H, 18 * H),
            ]
        );
    }

    #[test]
    fn cancelled_reservations_leave_vehicle_free() {
        let vs = vehicle_with(&[
            (10 * H, 12 * H, ReservationStatus::Cancelled),
            (12 * H, 13 * H, ReservationStatus::Completed),
        ]);
        let window = Span::new(8 * H, 18 * H);
        assert_eq!(free_windows(&vs, &window), vec![window]);
    }

    #[test]
    fn reservation_straddling_window_is_clamped() {
        let vs = vehicle_with(&[(6 * H, 9 * H, ReservationStatus::Confirmed)]);
        let free = free_windows(&vs, &Span::new(8 * H, 10 * H));
        assert_eq!(free, vec![Span::new(9 * H, 10 * H)]);
    }
}

//! Collision property tests

#[cfg(test)]
mod tests {
    use archipelago::collision::{max_position, move_axis_aligned, PixelBox};
    use archipelago::grid::WorldGrid;
    use archipelago::islands;
    use archipelago::player::Player;
    use archipelago::tiles::{TileKind, EMPTY};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const COLS: usize = 12;
    const ROWS: usize = 10;
    const DISPLAY: u32 = 32;

    /// Random land/water map with the odd bridge and trunk on top.
    fn random_grid(rng: &mut StdRng) -> WorldGrid {
        let cells = COLS * ROWS;
        let base: Vec<_> = (0..cells)
            .map(|_| {
                if rng.gen_bool(0.3) {
                    TileKind::Water.id()
                } else {
                    TileKind::Land.id()
                }
            })
            .collect();
        let objects: Vec<_> = base
            .iter()
            .map(|&t| {
                let roll: f64 = rng.gen();
                if t == TileKind::Water.id() && roll < 0.2 {
                    TileKind::Bridge.id()
                } else if t == TileKind::Land.id() && roll < 0.1 {
                    TileKind::TreeBottom.id()
                } else {
                    EMPTY
                }
            })
            .collect();
        let (isl, n) = islands::label(&base, COLS, ROWS, TileKind::Land.id());
        WorldGrid::from_parts(COLS, ROWS, 16, DISPLAY, vec![base, objects, vec![EMPTY; cells]], isl, n)
            .unwrap()
    }

    fn random_clear_box(grid: &WorldGrid, rng: &mut StdRng) -> Option<PixelBox> {
        let w = rng.gen_range(4..=40) as f64;
        let h = rng.gen_range(4..=40) as f64;
        let (max_x, max_y) = max_position(grid, w, h);
        for _ in 0..100 {
            let b = PixelBox::new(rng.gen_range(0.0..=max_x), rng.gen_range(0.0..=max_y), w, h);
            if !b.overlaps_solid(grid) {
                return Some(b);
            }
        }
        None
    }

    #[test]
    fn moves_never_end_inside_solid_or_off_map() {
        let mut rng = StdRng::seed_from_u64(0xC0FFEE);
        let mut checked = 0;

        for _ in 0..40 {
            let grid = random_grid(&mut rng);
            for _ in 0..50 {
                let Some(start) = random_clear_box(&grid, &mut rng) else {
                    continue;
                };
                let dx = rng.gen_range(-200.0..200.0);
                let dy = rng.gen_range(-200.0..200.0);
                let end = move_axis_aligned(start, dx, dy, &grid);
                let (max_x, max_y) = max_position(&grid, start.width, start.height);

                assert!(
                    !end.overlaps_solid(&grid),
                    "{:?} + ({}, {}) ended in solid at {:?}",
                    start,
                    dx,
                    dy,
                    end
                );
                assert!((0.0..=max_x).contains(&end.x));
                assert!((0.0..=max_y).contains(&end.y));
                assert_eq!((end.width, end.height), (start.width, start.height));
                checked += 1;
            }
        }
        assert!(checked > 1000);
    }

    #[test]
    fn movement_never_overshoots_the_request() {
        let mut rng = StdRng::seed_from_u64(77);
        for _ in 0..500 {
            let grid = random_grid(&mut rng);
            let Some(start) = random_clear_box(&grid, &mut rng) else {
                continue;
            };
            let dx = rng.gen_range(-100.0..100.0);
            let end = move_axis_aligned(start, dx, 0.0, &grid);
            assert_eq!(end.y, start.y);
            assert!((end.x - start.x).abs() <= dx.abs() + 1e-9);
            assert!((end.x - start.x) * dx >= 0.0, "box moved against the request");
        }
    }

    #[test]
    fn bridge_over_water_is_walkable() {
        let base = vec![
            TileKind::Land.id(),
            TileKind::Water.id(),
            TileKind::Land.id(),
        ];
        let objects = vec![EMPTY, TileKind::Bridge.id(), EMPTY];
        let (isl, n) = islands::label(&base, 3, 1, TileKind::Land.id());
        let grid = WorldGrid::from_parts(3, 1, 16, 32, vec![base, objects], isl, n).unwrap();

        let mut p = Player::new(1, "Player1", PixelBox::new(0.0, 0.0, 20.0, 20.0));
        p.move_by(70.0, 0.0, &grid);
        assert_eq!(p.x, 70.0);
        assert!(p.visited_islands.is_empty());
        p.record_island(&grid);
        assert_eq!(p.visited_islands.len(), 1);
    }
}

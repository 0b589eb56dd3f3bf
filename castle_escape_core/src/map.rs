use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::{GRID_SIZE, Room};

/// Represents errors that can occur within the grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Room ({row}, {col}) is out of bounds for a {size}x{size} castle")]
    OutOfBounds { row: usize, col: usize, size: usize },
}

/// A square grid holding one value per castle room.
///
/// Stores elements of type `T` in a flat vector using row-major order, so the
/// flat index of a room is `row * GRID_SIZE + col`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a castle-sized grid filled with default values.
    pub fn new() -> Self
    where
        T: Default + Clone,
    {
        Grid {
            cells: vec![T::default(); GRID_SIZE * GRID_SIZE],
        }
    }

    /// Creates a castle-sized grid filled by a generator function.
    ///
    /// The generator is called once per room in row-major order.
    pub fn from_generator<F>(mut f: F) -> Self
    where
        F: FnMut(Room) -> T,
    {
        let cells = (0..GRID_SIZE * GRID_SIZE)
            .map(|index| f(Room::new(index / GRID_SIZE, index % GRID_SIZE)))
            .collect();
        Grid { cells }
    }

    /// Converts a room to a flat vector index.
    ///
    /// Returns `None` if the room is out of bounds.
    #[inline]
    pub fn room_to_index(room: Room) -> Option<usize> {
        room.in_bounds().then(|| room.row * GRID_SIZE + room.col)
    }

    /// Converts a flat vector index back to a room.
    ///
    /// Returns `None` if the index is out of bounds.
    #[inline]
    pub fn index_to_room(index: usize) -> Option<Room> {
        (index < GRID_SIZE * GRID_SIZE).then(|| Room::new(index / GRID_SIZE, index % GRID_SIZE))
    }

    /// Gets an immutable reference to the cell for a room.
    ///
    /// Returns `None` if the room is out of bounds.
    pub fn get(&self, room: Room) -> Option<&T> {
        self.cells.get(Self::room_to_index(room)?)
    }

    /// Sets the value of the cell for a room.
    ///
    /// Returns `Err(GridError::OutOfBounds)` if the room is not on the grid.
    pub fn set(&mut self, room: Room, value: T) -> Result<(), GridError> {
        let index = Self::room_to_index(room).ok_or(GridError::OutOfBounds {
            row: room.row,
            col: room.col,
            size: GRID_SIZE,
        })?;
        self.cells[index] = value;
        Ok(())
    }

    /// Returns an iterator over the cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.cells.iter()
    }

    /// Returns an iterator that yields `(Room, &T)` for each cell.
    pub fn enumerate(&self) -> impl Iterator<Item = (Room, &T)> {
        self.cells
            .iter()
            .enumerate()
            .map(|(index, cell)| (Room::new(index / GRID_SIZE, index % GRID_SIZE), cell))
    }

    /// Returns the cells of one row, left to right.
    pub fn row(&self, row: usize) -> &[T] {
        let start = row * GRID_SIZE;
        &self.cells[start..start + GRID_SIZE]
    }
}

impl<T: Default + Clone> Default for Grid<T> {
    fn default() -> Self {
        Grid::new()
    }
}

/// Indexing by room for immutable access.
impl<T> Index<Room> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, room: Room) -> &Self::Output {
        match Self::room_to_index(room) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index {} out of bounds for a {}x{} castle",
                room, GRID_SIZE, GRID_SIZE
            ),
        }
    }
}

/// Indexing by room for mutable access.
impl<T> IndexMut<Room> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, room: Room) -> &mut Self::Output {
        match Self::room_to_index(room) {
            Some(idx) => &mut self.cells[idx],
            None => panic!(
                "Grid index {} out of bounds for a {}x{} castle",
                room, GRID_SIZE, GRID_SIZE
            ),
        }
    }
}

use crate::mutex::{MainCtx, MutexCell};

/// The last `SIZE` values, oldest first.
pub struct History<T, const SIZE: usize> {
    hist: [MutexCell<T>; SIZE],
}

impl<T, const SIZE: usize> History<T, SIZE> {
    pub const fn new(hist: [MutexCell<T>; SIZE]) -> Self {
        Self { hist }
    }
}

impl<T: Copy, const SIZE: usize> History<T, SIZE> {
    pub fn push_back(&self, m: &MainCtx<'_>, new: T) {
        for i in 1..SIZE {
            self.hist[i - 1].set(m, self.hist[i].get(m))
        }
        self.hist[SIZE - 1].set(m, new);
    }

    pub fn get(&self, m: &MainCtx<'_>, index: usize) -> T {
        self.hist[index].get(m)
    }
}

impl<const SIZE: usize> History<u16, SIZE> {
    pub fn average(&self, m: &MainCtx<'_>) -> u16 {
        let sum: u32 = (0..SIZE).map(|i| self.get(m, i) as u32).sum();
        (sum / SIZE as u32) as u16
    }
}

// vim: ts=4 sw=4 expandtab

/// Fixed ring of `N` instances for double or triple buffering.
///
/// `swap` rotates the ring by one: the old current becomes `previous`, the
/// old next becomes `current`. Elements are moved through adjacent swaps, so
/// owning types can hook into every exchange with [`SwapChain::swap_with`].
#[derive(Debug, Clone)]
pub struct SwapChain<T, const N: usize> {
    chain: [T; N],
}

impl<T, const N: usize> SwapChain<T, N> {
    const AT_LEAST_TWO: () = assert!(N > 1, "a swap chain needs at least two elements");

    pub fn new(chain: [T; N]) -> Self {
        let () = Self::AT_LEAST_TWO;
        Self { chain }
    }

    pub fn from_fn(f: impl FnMut(usize) -> T) -> Self {
        Self::new(std::array::from_fn(f))
    }

    #[inline]
    fn index(offset: isize) -> usize {
        let n = N as isize;
        ((offset % n + n) % n) as usize
    }

    pub fn current(&self) -> &T {
        &self.chain[Self::index(0)]
    }

    pub fn current_mut(&mut self) -> &mut T {
        &mut self.chain[Self::index(0)]
    }

    pub fn previous(&self) -> &T {
        &self.chain[Self::index(-1)]
    }

    pub fn previous_mut(&mut self) -> &mut T {
        &mut self.chain[Self::index(-1)]
    }

    pub fn next(&self) -> &T {
        &self.chain[Self::index(1)]
    }

    pub fn next_mut(&mut self) -> &mut T {
        &mut self.chain[Self::index(1)]
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.chain.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.chain.iter_mut()
    }

    /// Rotates by one with plain value swaps.
    pub fn swap(&mut self) {
        self.swap_with(std::mem::swap);
    }

    /// Rotates by one, exchanging each adjacent pair through `exchange`.
    pub fn swap_with(&mut self, mut exchange: impl FnMut(&mut T, &mut T)) {
        for i in 0..N - 1 {
            let (head, tail) = self.chain.split_at_mut(i + 1);
            exchange(&mut head[i], &mut tail[0]);
        }
    }
}

impl<T: Default, const N: usize> Default for SwapChain<T, N> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_moves_current_to_previous() {
        let mut chain = SwapChain::new(['a', 'b', 'c']);
        assert_eq!((*chain.previous(), *chain.current(), *chain.next()), ('c', 'a', 'b'));

        let before = *chain.current();
        chain.swap();
        assert_eq!(*chain.previous(), before);
        assert_eq!(*chain.current(), 'b');
        assert_eq!(*chain.next(), 'c');
    }

    #[test]
    fn n_swaps_return_to_the_start() {
        let mut chain = SwapChain::<u32, 4>::from_fn(|i| i as u32);
        for _ in 0..4 {
            chain.swap();
        }
        assert_eq!(*chain.current(), 0);
        assert_eq!(chain.iter().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn double_buffer_alternates() {
        let mut chain = SwapChain::new([1, 2]);
        chain.swap();
        assert_eq!((*chain.current(), *chain.previous(), *chain.next()), (2, 1, 1));
    }

    #[test]
    fn swap_with_sees_every_adjacent_pair() {
        let mut chain = SwapChain::new([0, 1, 2]);
        let mut exchanges = 0;
        chain.swap_with(|a, b| {
            exchanges += 1;
            std::mem::swap(a, b);
        });
        assert_eq!(exchanges, 2);
        assert_eq!(*chain.current(), 1);
    }
}

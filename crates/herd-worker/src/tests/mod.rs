mod gauge;
